//! Delegation authorization: permission scopes and the caller's
//! delegable-action set resolved from active memberships.

mod delegable;
mod scope;

pub use delegable::{count_active_positions, load_delegable_set, DelegablePermission, DelegableSet};
pub use scope::Scope;

/// Well-known action codes from the seeded catalog.
#[allow(dead_code)]
pub mod actions {
    // Finance
    pub const INVOICE_ISSUE: &str = "finance.invoice.issue";
    pub const INVOICE_APPROVE: &str = "finance.invoice.approve";
    pub const REPORT_VIEW: &str = "finance.report.view";

    // Scheduling
    pub const SCHEDULE_EDIT: &str = "schedule.edit";
    pub const SCHEDULE_PUBLISH: &str = "schedule.publish";

    // Staffing
    pub const MEMBER_MANAGE: &str = "member.manage";

    // Communication
    pub const WIKI_PUBLISH: &str = "wiki.publish";
    pub const WIKI_ENSHRINE: &str = "wiki.enshrine";
    pub const BROADCAST: &str = "communicator.broadcast";

    // HR
    pub const TALENT_VIEW: &str = "talent.profile.view";
    pub const TALENT_EDIT: &str = "talent.profile.edit";

    // Improvement
    pub const KAIZEN_MODERATE: &str = "kaizen.moderate";
}
