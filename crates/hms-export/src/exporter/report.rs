//! Human-readable failure reports.

use crate::executor::ErrorInfo;

/// Banner block for one failure:
///
/// ```text
/// #################
/// ##### d1.t1 #####
/// #################
/// not found: Table or view 'd1.t1' not found
///
/// ```
pub fn failure_banner(failure: &ErrorInfo) -> String {
    let rule = "#".repeat(failure.key.chars().count() + 12);
    format!(
        "{rule}\n##### {key} #####\n{rule}\n{kind}: {message}\n\n\n",
        rule = rule,
        key = failure.key,
        kind = failure.kind,
        message = failure.message
    )
}

/// Banners for all failures, concatenated.
pub fn failure_report<'a>(failures: impl IntoIterator<Item = &'a ErrorInfo>) -> String {
    failures.into_iter().map(failure_banner).collect()
}
