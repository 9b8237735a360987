use std::collections::HashMap;

/// Count exact matches of recorded answers against the answer key, walking
/// the attempt's frozen question order. Unanswered questions and questions
/// missing from the key count as incorrect. No partial credit.
pub(crate) fn score_attempt(
    question_ids: &[String],
    answers: &HashMap<String, i32>,
    answer_keys: &HashMap<String, i32>,
) -> i32 {
    question_ids
        .iter()
        .filter(|question_id| {
            match (answers.get(*question_id), answer_keys.get(*question_id)) {
                (Some(selected), Some(correct)) => selected == correct,
                _ => false,
            }
        })
        .count() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn counts_only_exact_matches() {
        let question_ids = ids(&["q1", "q2", "q3"]);
        let answers = HashMap::from([("q1".to_string(), 0)]);
        let keys = HashMap::from([
            ("q1".to_string(), 0),
            ("q2".to_string(), 1),
            ("q3".to_string(), 2),
        ]);

        assert_eq!(score_attempt(&question_ids, &answers, &keys), 1);
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let question_ids = ids(&["q1", "q2"]);
        let keys = HashMap::from([("q1".to_string(), 0), ("q2".to_string(), 1)]);

        assert_eq!(score_attempt(&question_ids, &HashMap::new(), &keys), 0);
    }

    #[test]
    fn perfect_attempt_scores_full() {
        let question_ids = ids(&["q1", "q2", "q3"]);
        let answers = HashMap::from([
            ("q1".to_string(), 2),
            ("q2".to_string(), 0),
            ("q3".to_string(), 3),
        ]);
        let keys = answers.clone();

        assert_eq!(score_attempt(&question_ids, &answers, &keys), 3);
    }

    #[test]
    fn answer_for_question_outside_snapshot_is_ignored() {
        let question_ids = ids(&["q1"]);
        let answers = HashMap::from([("q1".to_string(), 1), ("stray".to_string(), 0)]);
        let keys = HashMap::from([("q1".to_string(), 1), ("stray".to_string(), 0)]);

        assert_eq!(score_attempt(&question_ids, &answers, &keys), 1);
    }

    #[test]
    fn question_missing_from_key_counts_incorrect() {
        let question_ids = ids(&["q1", "q2"]);
        let answers = HashMap::from([("q1".to_string(), 0), ("q2".to_string(), 0)]);
        let keys = HashMap::from([("q1".to_string(), 0)]);

        assert_eq!(score_attempt(&question_ids, &answers, &keys), 1);
    }
}
