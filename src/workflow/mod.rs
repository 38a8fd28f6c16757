//! Purchase order workflow: stages, actions and the transition table.
//!
//! The table here is the authoritative copy. Clients fetch it through
//! `GET /api/v1/workflow/stages` to decide which actions to offer, but every
//! transition is checked again with [`authorize_transition`] before it is
//! applied.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
    auth::{consts, has_permission, PermissionHolder},
    errors::ServiceError,
};

/// Stage of a purchase order. Also used as the order's status string.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Stage {
    #[default]
    Draft,
    PendingApproval,
    #[serde(rename = "APPROVED_L1")]
    #[strum(serialize = "APPROVED_L1")]
    ApprovedL1,
    ApprovedFinal,
    Ordered,
    PartialReceived,
    Received,
    QcPending,
    QcPassed,
    QcFailed,
    Completed,
    Cancelled,
}

/// Something a user can do to a purchase order in a given stage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Action {
    Approve,
    Reject,
    Cancel,
    PlaceOrder,
    ReceivePartial,
    Receive,
    SendToQc,
    PassQc,
    FailQc,
    Complete,
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: Stage,
    pub action: Action,
    pub to: Stage,
    pub permission: &'static str,
}

const fn t(from: Stage, action: Action, to: Stage, permission: &'static str) -> Transition {
    Transition {
        from,
        action,
        to,
        permission,
    }
}

pub const TRANSITIONS: &[Transition] = &[
    t(Stage::Draft, Action::Approve, Stage::PendingApproval, consts::PURCHASE_ORDERS_SUBMIT),
    t(Stage::Draft, Action::Cancel, Stage::Cancelled, consts::PURCHASE_ORDERS_CANCEL),
    t(
        Stage::PendingApproval,
        Action::Approve,
        Stage::ApprovedL1,
        consts::PURCHASE_ORDERS_APPROVE_L1,
    ),
    t(Stage::PendingApproval, Action::Reject, Stage::Draft, consts::PURCHASE_ORDERS_REJECT),
    t(Stage::PendingApproval, Action::Cancel, Stage::Cancelled, consts::PURCHASE_ORDERS_CANCEL),
    t(
        Stage::ApprovedL1,
        Action::Approve,
        Stage::ApprovedFinal,
        consts::PURCHASE_ORDERS_APPROVE_FINAL,
    ),
    t(Stage::ApprovedL1, Action::Reject, Stage::Draft, consts::PURCHASE_ORDERS_REJECT),
    t(Stage::ApprovedL1, Action::Cancel, Stage::Cancelled, consts::PURCHASE_ORDERS_CANCEL),
    t(Stage::ApprovedFinal, Action::PlaceOrder, Stage::Ordered, consts::PURCHASE_ORDERS_ORDER),
    t(Stage::ApprovedFinal, Action::Cancel, Stage::Cancelled, consts::PURCHASE_ORDERS_CANCEL),
    t(
        Stage::Ordered,
        Action::ReceivePartial,
        Stage::PartialReceived,
        consts::PURCHASE_ORDERS_RECEIVE,
    ),
    t(Stage::Ordered, Action::Receive, Stage::Received, consts::PURCHASE_ORDERS_RECEIVE),
    t(Stage::Ordered, Action::Cancel, Stage::Cancelled, consts::PURCHASE_ORDERS_CANCEL),
    t(
        Stage::PartialReceived,
        Action::ReceivePartial,
        Stage::PartialReceived,
        consts::PURCHASE_ORDERS_RECEIVE,
    ),
    t(Stage::PartialReceived, Action::Receive, Stage::Received, consts::PURCHASE_ORDERS_RECEIVE),
    t(Stage::Received, Action::SendToQc, Stage::QcPending, consts::QUALITY_CONTROL_CREATE),
    t(Stage::QcPending, Action::PassQc, Stage::QcPassed, consts::QUALITY_CONTROL_APPROVE),
    t(Stage::QcPending, Action::FailQc, Stage::QcFailed, consts::QUALITY_CONTROL_APPROVE),
    t(Stage::QcPassed, Action::Complete, Stage::Completed, consts::PURCHASE_ORDERS_COMPLETE),
    t(Stage::QcFailed, Action::Complete, Stage::Completed, consts::PURCHASE_ORDERS_COMPLETE),
];

fn find(stage: Stage, action: Action) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|tr| tr.from == stage && tr.action == action)
}

/// Resulting stage of `action` in `stage`, or `None` if the pair is not in the table.
pub fn next_stage(stage: Stage, action: Action) -> Option<Stage> {
    find(stage, action).map(|tr| tr.to)
}

/// Permission needed to perform `action` in `stage`.
pub fn required_permission(stage: Stage, action: Action) -> Option<&'static str> {
    find(stage, action).map(|tr| tr.permission)
}

/// Every action enumerated for `stage`, in table order.
pub fn permitted_actions(stage: Stage) -> Vec<Action> {
    TRANSITIONS
        .iter()
        .filter(|tr| tr.from == stage)
        .map(|tr| tr.action)
        .collect()
}

/// Actions in `stage` whose permission `user` holds.
pub fn available_actions<H: PermissionHolder + ?Sized>(stage: Stage, user: &H) -> Vec<Action> {
    TRANSITIONS
        .iter()
        .filter(|tr| tr.from == stage && has_permission(user, tr.permission))
        .map(|tr| tr.action)
        .collect()
}

/// Checks `action` against the table and the user's permissions and returns the next stage.
pub fn authorize_transition<H: PermissionHolder + ?Sized>(
    stage: Stage,
    action: Action,
    user: &H,
) -> Result<Stage, ServiceError> {
    let transition = find(stage, action).ok_or_else(|| {
        ServiceError::InvalidOperation(format!(
            "action '{}' is not allowed in stage {}",
            action, stage
        ))
    })?;

    if !has_permission(user, transition.permission) {
        return Err(ServiceError::Forbidden(format!(
            "action '{}' in stage {} requires '{}'",
            action, stage, transition.permission
        )));
    }

    Ok(transition.to)
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        permitted_actions(*self).is_empty()
    }

    /// Lines and header may still be edited.
    pub fn is_editable(&self) -> bool {
        matches!(self, Stage::Draft)
    }

    /// Goods have (at least partly) arrived.
    pub fn has_receipts(&self) -> bool {
        matches!(
            self,
            Stage::PartialReceived
                | Stage::Received
                | Stage::QcPending
                | Stage::QcPassed
                | Stage::QcFailed
                | Stage::Completed
        )
    }
}

/// Serializable view of one stage, as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct StageEntry {
    pub stage: Stage,
    pub terminal: bool,
    pub transitions: Vec<StageTransition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTransition {
    pub action: Action,
    pub to: Stage,
    pub permission: &'static str,
}

/// Dump of the whole table grouped by stage.
pub fn stage_table() -> Vec<StageEntry> {
    Stage::iter()
        .map(|stage| StageEntry {
            stage,
            terminal: stage.is_terminal(),
            transitions: TRANSITIONS
                .iter()
                .filter(|tr| tr.from == stage)
                .map(|tr| StageTransition {
                    action: tr.action,
                    to: tr.to,
                    permission: tr.permission,
                })
                .collect(),
        })
        .collect()
}
