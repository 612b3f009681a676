//! Scoring rules shared by live battles, result finalization and the global leaderboard.

use crate::{dao::models::AnswerLedgerEntryEntity, state::room::AnswerRecord};

/// Points for a correct answer.
pub const BASE_POINTS: u32 = 10;
/// Cap on the speed bonus of a single answer.
pub const MAX_SPEED_BONUS: u32 = 10;
/// Leaderboard points per answer of the best streak.
pub const STREAK_POINTS: u32 = 5;
/// Average answer time (seconds) at which the leaderboard speed bonus reaches zero.
pub const LEADERBOARD_REFERENCE_SECS: f64 = 60.0;

/// Points earned by a single answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerScore {
    /// Base plus speed bonus.
    pub points: u32,
    /// Speed share of `points`.
    pub speed_bonus: u32,
}

/// Bonus for answering before the time limit, whatever the answer.
pub fn speed_bonus(time_taken: u32, time_limit: u32) -> u32 {
    time_limit.saturating_sub(time_taken).min(MAX_SPEED_BONUS)
}

/// Score one answer against its question's time limit.
pub fn score_answer(is_correct: bool, time_taken: u32, time_limit: u32) -> AnswerScore {
    let base = if is_correct { BASE_POINTS } else { 0 };
    let speed_bonus = speed_bonus(time_taken, time_limit);
    AnswerScore {
        points: base + speed_bonus,
        speed_bonus,
    }
}

/// `round(100 * part / whole)`, rounding halves up; zero when `whole` is zero.
pub fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let part = u64::from(part);
    let whole = u64::from(whole);
    ((200 * part + whole) / (2 * whole)) as u32
}

/// Anything that can feed the aggregate scoring.
pub trait ScoredAnswer {
    /// Whether the answer was correct.
    fn is_correct(&self) -> bool;
    /// Seconds spent on the answer.
    fn time_taken(&self) -> u32;
}

impl ScoredAnswer for AnswerRecord {
    fn is_correct(&self) -> bool {
        self.is_correct
    }

    fn time_taken(&self) -> u32 {
        self.time_taken
    }
}

impl ScoredAnswer for AnswerLedgerEntryEntity {
    fn is_correct(&self) -> bool {
        self.is_correct
    }

    fn time_taken(&self) -> u32 {
        self.time_taken
    }
}

/// Aggregate statistics over an ordered sequence of answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    /// Number of answers.
    pub total_questions: u32,
    /// Number of correct answers.
    pub correct: u32,
    /// Rounded percentage of correct answers.
    pub accuracy: u32,
    /// Longest run of consecutive correct answers.
    pub best_streak: u32,
    /// Mean seconds per answer.
    pub average_time: f64,
    /// `correct·10 + best_streak·5 + accuracy + max(0, 60 − average_time)`, rounded.
    pub total_score: u32,
}

/// Summarize answers given in chronological order.
pub fn summarize<'a, T, I>(answers: I) -> ScoreSummary
where
    T: ScoredAnswer + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut total = 0u32;
    let mut correct = 0u32;
    let mut streak = 0u32;
    let mut best_streak = 0u32;
    let mut total_time = 0u64;

    for answer in answers {
        total += 1;
        total_time += u64::from(answer.time_taken());
        if answer.is_correct() {
            correct += 1;
            streak += 1;
            best_streak = best_streak.max(streak);
        } else {
            streak = 0;
        }
    }

    if total == 0 {
        return ScoreSummary {
            total_questions: 0,
            correct: 0,
            accuracy: 0,
            best_streak: 0,
            average_time: 0.0,
            total_score: 0,
        };
    }

    let accuracy = percentage(correct, total);
    let average_time = total_time as f64 / f64::from(total);
    let speed = (LEADERBOARD_REFERENCE_SECS - average_time).max(0.0).round() as u32;
    let total_score = correct * BASE_POINTS + best_streak * STREAK_POINTS + accuracy + speed;

    ScoreSummary {
        total_questions: total,
        correct,
        accuracy,
        best_streak,
        average_time,
        total_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Answer(bool, u32);

    impl ScoredAnswer for Answer {
        fn is_correct(&self) -> bool {
            self.0
        }

        fn time_taken(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn speed_bonus_is_capped() {
        assert_eq!(speed_bonus(5, 30), 10);
        assert_eq!(speed_bonus(25, 30), 5);
        assert_eq!(speed_bonus(30, 30), 0);
        assert_eq!(speed_bonus(45, 30), 0);
    }

    #[test]
    fn wrong_answers_still_earn_the_speed_bonus() {
        let quick = score_answer(false, 5, 30);
        assert_eq!(quick.points, 10);
        assert_eq!(quick.speed_bonus, 10);

        let late = score_answer(false, 27, 30);
        assert_eq!(late.points, 3);

        // a timeout is recorded at the limit and earns nothing
        assert_eq!(score_answer(false, 30, 30).points, 0);
    }

    #[test]
    fn wrong_answers_never_outscore_right_ones() {
        for limit in [5, 10, 30, 120] {
            for taken in 0..=limit + 5 {
                let wrong = score_answer(false, taken, limit);
                let right = score_answer(true, taken, limit);
                assert!(wrong.points <= right.points);
                assert_eq!(right.points, BASE_POINTS + right.speed_bonus);
            }
        }
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn summary_tracks_streaks_and_speed() {
        let answers = vec![
            Answer(true, 10),
            Answer(true, 20),
            Answer(false, 30),
            Answer(true, 20),
        ];
        let summary = summarize(&answers);
        assert_eq!(summary.total_questions, 4);
        assert_eq!(summary.correct, 3);
        assert_eq!(summary.accuracy, 75);
        assert_eq!(summary.best_streak, 2);
        assert_eq!(summary.average_time, 20.0);
        // 3·10 + 2·5 + 75 + (60 − 20)
        assert_eq!(summary.total_score, 155);
    }

    #[test]
    fn slow_answers_get_no_speed_points() {
        let answers = vec![Answer(false, 90), Answer(false, 120)];
        let summary = summarize(&answers);
        assert_eq!(summary.accuracy, 0);
        assert_eq!(summary.total_score, 0);
    }

    #[test]
    fn empty_history_scores_zero() {
        let answers: Vec<Answer> = Vec::new();
        let summary = summarize(&answers);
        assert_eq!(summary.total_questions, 0);
        assert_eq!(summary.total_score, 0);
    }
}
