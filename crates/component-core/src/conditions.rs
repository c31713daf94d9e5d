use chrono::Utc;

use crate::crds::Condition;
use crate::models::ConditionType;

/// History kept on a component status; older entries fall off the front.
pub const MAX_CONDITIONS: usize = 30;
pub const CONDITION_TRUE: &str = "True";

pub fn new_condition(
    r#type: ConditionType,
    reason: Option<String>,
    message: Option<String>,
) -> Condition {
    Condition {
        r#type,
        status: CONDITION_TRUE.to_string(),
        last_transition_time: Utc::now(),
        reason,
        message,
    }
}

pub fn last_condition_type(conditions: &[Condition]) -> Option<ConditionType> {
    conditions.last().map(|condition| condition.r#type)
}

/// Appends a condition unless the newest entry already has this type.
/// Returns whether the ledger changed.
pub fn append_condition(conditions: &mut Vec<Condition>, r#type: ConditionType) -> bool {
    if last_condition_type(conditions) == Some(r#type) {
        return false;
    }
    push_bounded(conditions, new_condition(r#type, None, None));
    true
}

/// Records a failure. Consecutive failures collapse into the newest entry,
/// whose reason and message are refreshed when they differ.
pub fn append_failure(conditions: &mut Vec<Condition>, reason: &str, message: &str) -> bool {
    if let Some(last) = conditions.last_mut()
        && last.r#type == ConditionType::Failed
    {
        if last.reason.as_deref() == Some(reason) && last.message.as_deref() == Some(message) {
            return false;
        }
        last.reason = Some(reason.to_string());
        last.message = Some(message.to_string());
        return true;
    }

    push_bounded(
        conditions,
        new_condition(
            ConditionType::Failed,
            Some(reason.to_string()),
            Some(message.to_string()),
        ),
    );
    true
}

fn push_bounded(conditions: &mut Vec<Condition>, condition: Condition) {
    conditions.push(condition);
    if conditions.len() > MAX_CONDITIONS {
        let overflow = conditions.len() - MAX_CONDITIONS;
        conditions.drain(..overflow);
    }
}
