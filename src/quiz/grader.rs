use chrono::{DateTime, Utc};

use crate::domain::{AnswerMode, GradedAnswer, QuizSpec, Response, ResultSet, Submission};

/// Grade a quiz. Submissions line up with questions by position; a missing
/// submission counts as an empty (wrong) answer and extras are ignored.
pub fn grade(spec: &QuizSpec, answers: &[Submission], graded_at: DateTime<Utc>) -> ResultSet {
  let empty = Submission::default();

  let graded: Vec<GradedAnswer> = spec
    .questions()
    .enumerate()
    .map(|(i, (item, mode))| {
      let submission = answers.get(i).unwrap_or(&empty);
      let (response, correct) = match mode {
        AnswerMode::A => (
          Response::MeaningAndPos {
            pos: submission.pos.clone(),
            meaning: submission.meaning.clone(),
          },
          item.check_meaning_and_pos(submission.pos.as_slice(), submission.meaning.as_slice()),
        ),
        AnswerMode::B => (
          Response::Spelling {
            word: submission.word.clone(),
          },
          item.check_spelling(&submission.word),
        ),
      };
      GradedAnswer {
        mode,
        item: item.clone(),
        response,
        correct,
      }
    })
    .collect();

  let correct_count = graded.iter().filter(|g| g.correct).count();
  let elapsed_seconds = (graded_at - spec.started_at()).num_seconds().max(0) as u64;

  ResultSet {
    answers: graded,
    correct_count,
    elapsed_seconds,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{QuizMode, VocabularyItem};
  use chrono::Duration;

  fn spec(modes: Vec<AnswerMode>, started_at: DateTime<Utc>) -> QuizSpec {
    let items = vec![
      VocabularyItem::new("cat", "noun", "feline&animal"),
      VocabularyItem::new("run", "verb", "move fast"),
    ];
    QuizSpec::new(items, modes, QuizMode::C, started_at).unwrap()
  }

  #[test]
  fn test_grade_mode_a() {
    let start = Utc::now();
    let quiz = spec(vec![AnswerMode::A, AnswerMode::A], start);
    let answers = vec![
      Submission::meaning_and_pos(&["noun"], &["feline", "animal"]),
      Submission::meaning_and_pos(&["verb"], &["jump"]),
    ];

    let result = grade(&quiz, &answers, start + Duration::seconds(42));
    assert_eq!(result.correct_count, 1);
    assert!(result.answers[0].correct);
    assert!(!result.answers[1].correct);
    assert_eq!(result.elapsed_seconds, 42);
  }

  #[test]
  fn test_grade_mode_b() {
    let start = Utc::now();
    let quiz = spec(vec![AnswerMode::B, AnswerMode::B], start);
    let answers = vec![Submission::spelling("  CAT "), Submission::spelling("ran")];

    let result = grade(&quiz, &answers, start);
    assert_eq!(result.correct_count, 1);
    assert_eq!(
      result.answers[0].response,
      Response::Spelling {
        word: "  CAT ".into()
      }
    );
  }

  #[test]
  fn test_grade_uses_each_questions_mode() {
    let start = Utc::now();
    let quiz = spec(vec![AnswerMode::B, AnswerMode::A], start);
    // Each submission carries the answer for the other mode too; only the question's mode counts
    let answers = vec![
      Submission {
        pos: vec!["noun".into()],
        meaning: vec!["feline".into(), "animal".into()],
        word: "dog".into(),
      },
      Submission {
        pos: vec!["verb".into()],
        meaning: vec!["move fast".into()],
        word: "walk".into(),
      },
    ];

    let result = grade(&quiz, &answers, start);
    assert!(!result.answers[0].correct);
    assert!(result.answers[1].correct);
    assert_eq!(result.answers[0].mode, AnswerMode::B);
    assert_eq!(result.answers[1].mode, AnswerMode::A);
  }

  #[test]
  fn test_missing_submissions_are_wrong() {
    let start = Utc::now();
    let quiz = spec(vec![AnswerMode::A, AnswerMode::B], start);
    let result = grade(&quiz, &[], start);

    assert_eq!(result.total(), 2);
    assert_eq!(result.correct_count, 0);
    assert_eq!(
      result.answers[0].response,
      Response::MeaningAndPos {
        pos: vec![],
        meaning: vec![]
      }
    );
    assert_eq!(result.answers[1].response, Response::Spelling { word: String::new() });
  }

  #[test]
  fn test_extra_submissions_ignored() {
    let start = Utc::now();
    let quiz = spec(vec![AnswerMode::B, AnswerMode::B], start);
    let answers = vec![
      Submission::spelling("cat"),
      Submission::spelling("run"),
      Submission::spelling("extra"),
    ];
    let result = grade(&quiz, &answers, start);
    assert_eq!(result.total(), 2);
    assert_eq!(result.correct_count, 2);
  }

  #[test]
  fn test_elapsed_floors_and_clamps() {
    let start = Utc::now();
    let quiz = spec(vec![AnswerMode::B, AnswerMode::B], start);

    let result = grade(&quiz, &[], start + Duration::milliseconds(2999));
    assert_eq!(result.elapsed_seconds, 2);

    // Clock went backwards
    let result = grade(&quiz, &[], start - Duration::seconds(30));
    assert_eq!(result.elapsed_seconds, 0);
  }

  #[test]
  fn test_graded_answer_keeps_item() {
    let start = Utc::now();
    let quiz = spec(vec![AnswerMode::A, AnswerMode::A], start);
    let result = grade(&quiz, &[], start);
    assert_eq!(result.answers[0].item.word(), "cat");
    assert_eq!(result.answers[1].item.meaning(), "move fast");
  }
}
