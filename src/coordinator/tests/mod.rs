use super::test_helpers::*;
use super::*;
use crate::error::FailureCategory;
use std::time::Duration;


const URL: &str = "https://example.com/watch?v=abc";

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn progress_edits(ops: &[Call]) -> usize {
    ops.iter()
        .filter(|c| matches!(c, Call::Edit { text, .. } if text.starts_with("⬇️ Downloading:")))
        .count()
}

/// Assert the status sequence `send, edit*, (delete | final edit)`
fn assert_well_formed(ops: &[Call], expect_delete: bool) {
    assert!(
        matches!(ops.first(), Some(Call::SendStatus { .. })),
        "first op must create the status: {ops:?}"
    );
    assert_eq!(
        ops.iter()
            .filter(|c| matches!(c, Call::SendStatus { .. }))
            .count(),
        1,
        "{ops:?}"
    );
    let deletes = ops.iter().filter(|c| matches!(c, Call::Delete { .. })).count();
    if expect_delete {
        assert_eq!(deletes, 1, "{ops:?}");
        assert!(matches!(ops.last(), Some(Call::Delete { .. })), "{ops:?}");
    } else {
        assert_eq!(deletes, 0, "{ops:?}");
        assert!(matches!(ops.last(), Some(Call::Edit { .. })), "{ops:?}");
    }
}
