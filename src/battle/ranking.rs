//! Strict total order over final standings.

use std::{cmp::Ordering, time::SystemTime};

use uuid::Uuid;

use crate::state::room::BattleRoom;

/// What a participant is ranked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// Participant's user.
    pub user_id: Uuid,
    /// Score at completion.
    pub final_score: u32,
    /// Correct answers.
    pub total_correct: u32,
    /// Cumulative seconds spent answering.
    pub total_time: u64,
    /// Join timestamp.
    pub joined_at: SystemTime,
    /// Seat order, used when two joins carry the same timestamp.
    pub join_order: usize,
}

impl Standing {
    /// Standings of every participant of `room`, in seat order.
    pub fn from_room(room: &BattleRoom) -> Vec<Standing> {
        room.participants
            .values()
            .enumerate()
            .map(|(join_order, participant)| Standing {
                user_id: participant.user_id,
                final_score: participant.score,
                total_correct: participant.total_correct(),
                total_time: participant.total_time(),
                joined_at: participant.joined_at,
                join_order,
            })
            .collect()
    }
}

/// Best first: higher score, more correct answers, less time, earlier join.
pub fn compare(a: &Standing, b: &Standing) -> Ordering {
    b.final_score
        .cmp(&a.final_score)
        .then_with(|| b.total_correct.cmp(&a.total_correct))
        .then_with(|| a.total_time.cmp(&b.total_time))
        .then_with(|| a.joined_at.cmp(&b.joined_at))
        .then_with(|| a.join_order.cmp(&b.join_order))
}

/// Sort standings and assign 1-based ranks. Ranks are never shared.
pub fn rank(mut standings: Vec<Standing>) -> Vec<(u32, Standing)> {
    standings.sort_by(compare);
    standings
        .into_iter()
        .zip(1u32..)
        .map(|(standing, rank)| (rank, standing))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn standing(score: u32, correct: u32, time: u64, joined_offset: u64, order: usize) -> Standing {
        Standing {
            user_id: Uuid::new_v4(),
            final_score: score,
            total_correct: correct,
            total_time: time,
            joined_at: SystemTime::UNIX_EPOCH + Duration::from_secs(joined_offset),
            join_order: order,
        }
    }

    #[test]
    fn keys_apply_in_priority_order() {
        let by_score = standing(100, 1, 99, 9, 0);
        let by_correct = standing(90, 5, 99, 9, 1);
        let by_time = standing(90, 4, 10, 9, 2);
        let by_join = standing(90, 4, 20, 1, 3);
        let last = standing(90, 4, 20, 2, 4);

        let ranked = rank(vec![
            last.clone(),
            by_join.clone(),
            by_time.clone(),
            by_correct.clone(),
            by_score.clone(),
        ]);
        let order: Vec<Uuid> = ranked.iter().map(|(_, s)| s.user_id).collect();
        assert_eq!(
            order,
            vec![
                by_score.user_id,
                by_correct.user_id,
                by_time.user_id,
                by_join.user_id,
                last.user_id
            ]
        );
        let ranks: Vec<u32> = ranked.iter().map(|(rank, _)| *rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn identical_standings_still_get_distinct_ranks() {
        let a = standing(50, 2, 10, 3, 0);
        let mut b = a.clone();
        b.user_id = Uuid::new_v4();
        b.join_order = 1;

        let ranked = rank(vec![b.clone(), a.clone()]);
        assert_eq!(ranked[0], (1, a));
        assert_eq!(ranked[1], (2, b));
    }
}
