use crate::{
    collaborators::{NotificationKind, Notifier},
    protocol::GroupMember,
};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::watch;
use tracing::{debug, info};

/// Who is in the current group, and who we are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupMembership {
    /// Member identifier to whatever metadata the backend sent for it.
    pub members: BTreeMap<String, Map<String, Value>>,
    pub is_owner: bool,
    pub self_uid: Option<String>,
}

impl GroupMembership {
    pub fn contains(&self, uid: &str) -> bool {
        self.members.contains_key(uid)
    }
}

/// Keeps group membership in sync with the backend.
///
/// Every `group-update` replaces the member set wholesale; nothing from the
/// previous set survives.
pub struct GroupCoordinator {
    membership: watch::Sender<GroupMembership>,
    notifier: Arc<dyn Notifier>,
}

impl GroupCoordinator {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        let (membership, _) = watch::channel(GroupMembership::default());
        Self {
            membership,
            notifier,
        }
    }

    pub fn snapshot(&self) -> GroupMembership {
        self.membership.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GroupMembership> {
        self.membership.subscribe()
    }

    pub(crate) fn replace_members(&self, members: Vec<GroupMember>) {
        let members: BTreeMap<_, _> = members
            .into_iter()
            .map(|member| (member.uid, member.metadata))
            .collect();
        info!(count = members.len(), "Group membership updated.");
        self.membership.send_modify(|membership| membership.members = members);
    }

    pub(crate) fn set_owner(&self, is_owner: bool) {
        self.membership.send_if_modified(|membership| {
            let changed = membership.is_owner != is_owner;
            membership.is_owner = is_owner;
            changed
        });
    }

    pub(crate) fn set_self_uid(&self, uid: &str) {
        debug!(%uid, "Client identifier assigned.");
        self.membership.send_if_modified(|membership| {
            if membership.self_uid.as_deref() == Some(uid) {
                return false;
            }
            membership.self_uid = Some(uid.to_string());
            true
        });
    }

    /// Surfaces the outcome of a group operation to the user.
    pub(crate) fn report_operation(&self, success: bool, message: &str) {
        let kind = if success {
            NotificationKind::Success
        } else {
            NotificationKind::Error
        };
        self.notifier.show(message, kind);
    }
}
