//! Global leaderboard computed from the answer ledger.

use std::{
    collections::{BTreeMap, HashMap},
    time::SystemTime,
};

use uuid::Uuid;

use crate::{
    battle::scoring,
    dao::models::{AnswerLedgerEntryEntity, ProfileEntity},
};

/// Name shown for users without a usable profile.
pub const ANONYMOUS: &str = "Anonymous";

/// Aggregated standing of one user.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// User the entry belongs to.
    pub user_id: Uuid,
    /// Display name from the user's profile.
    pub username: String,
    /// Composite leaderboard score.
    pub total_score: u32,
    /// Rounded percentage of correct answers.
    pub accuracy: u32,
    /// Longest run of consecutive correct answers.
    pub best_streak: u32,
    /// Number of ledger entries.
    pub total_questions: u32,
}

/// A computed leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardBoard {
    /// When the board was computed.
    pub generated_at: SystemTime,
    /// Entries, best first.
    pub entries: Vec<LeaderboardEntry>,
}

/// Group the ledger by user and rank users by their composite score.
///
/// Entries are replayed in `created_at` order; entries sharing a timestamp keep
/// their ledger order. Ties on the score are broken by user id so the output
/// only depends on the ledger contents.
pub fn aggregate(
    ledger: &[AnswerLedgerEntryEntity],
    profiles: &[ProfileEntity],
) -> Vec<LeaderboardEntry> {
    let mut by_user: BTreeMap<Uuid, Vec<&AnswerLedgerEntryEntity>> = BTreeMap::new();
    for entry in ledger {
        by_user.entry(entry.user_id).or_default().push(entry);
    }

    let names: HashMap<Uuid, &str> = profiles
        .iter()
        .filter_map(|profile| Some((profile.id, profile.display_name()?)))
        .collect();

    let mut entries: Vec<LeaderboardEntry> = by_user
        .into_iter()
        .map(|(user_id, mut answers)| {
            answers.sort_by_key(|entry| entry.created_at);
            let summary = scoring::summarize(answers.into_iter());
            LeaderboardEntry {
                user_id,
                username: names
                    .get(&user_id)
                    .map_or_else(|| ANONYMOUS.to_owned(), |name| (*name).to_owned()),
                total_score: summary.total_score,
                accuracy: summary.accuracy,
                best_streak: summary.best_streak,
                total_questions: summary.total_questions,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    entries
}

/// Distinct users present in the ledger.
pub fn ledger_users(ledger: &[AnswerLedgerEntryEntity]) -> Vec<Uuid> {
    let mut users: Vec<Uuid> = ledger.iter().map(|entry| entry.user_id).collect();
    users.sort_unstable();
    users.dedup();
    users
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(user: Uuid, correct: bool, time: u32, at: u64) -> AnswerLedgerEntryEntity {
        AnswerLedgerEntryEntity {
            id: Uuid::new_v4(),
            user_id: user,
            battle_room_id: None,
            is_correct: correct,
            time_taken: time,
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(at),
        }
    }

    #[test]
    fn streaks_follow_creation_time_not_ledger_order() {
        let user = Uuid::new_v4();
        // Appended out of order: chronologically it is correct, correct, wrong, correct.
        let ledger = vec![
            entry(user, true, 10, 4),
            entry(user, false, 10, 3),
            entry(user, true, 10, 1),
            entry(user, true, 10, 2),
        ];
        let board = aggregate(&ledger, &[]);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].best_streak, 2);
        assert_eq!(board[0].accuracy, 75);
        assert_eq!(board[0].total_questions, 4);
        // 3·10 + 2·5 + 75 + (60 − 10)
        assert_eq!(board[0].total_score, 165);
        assert_eq!(board[0].username, ANONYMOUS);
    }

    #[test]
    fn users_are_sorted_by_score_with_stable_ties() {
        let strong = Uuid::new_v4();
        let (tie_a, tie_b) = {
            let mut pair = [Uuid::new_v4(), Uuid::new_v4()];
            pair.sort();
            (pair[0], pair[1])
        };
        let ledger = vec![
            entry(tie_b, false, 60, 1),
            entry(strong, true, 5, 1),
            entry(tie_a, false, 60, 2),
        ];
        let profiles = vec![ProfileEntity {
            id: strong,
            username: None,
            full_name: Some("Ada Lovelace".into()),
        }];

        let board = aggregate(&ledger, &profiles);
        let order: Vec<Uuid> = board.iter().map(|entry| entry.user_id).collect();
        assert_eq!(order, vec![strong, tie_a, tie_b]);
        assert_eq!(board[0].username, "Ada Lovelace");
        assert_eq!(board[1].total_score, 0);
    }

    #[test]
    fn recomputation_is_identical() {
        let users: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let ledger: Vec<_> = (0..40)
            .map(|i| entry(users[i % users.len()], i % 3 != 0, (i % 20) as u32, (i / 2) as u64))
            .collect();
        assert_eq!(aggregate(&ledger, &[]), aggregate(&ledger, &[]));
        assert_eq!(ledger_users(&ledger).len(), 5);
    }

    #[test]
    fn empty_ledger_yields_empty_board() {
        assert!(aggregate(&[], &[]).is_empty());
    }
}
