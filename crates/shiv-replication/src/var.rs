//! A single replicated value with permissioned writes and ordered change
//! notification.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ReplicationError;
use crate::permission::{Principal, VarPermission};

// ---------------------------------------------------------------------------
// SubscriptionId
// ---------------------------------------------------------------------------

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

// ---------------------------------------------------------------------------
// ReplicatedVar
// ---------------------------------------------------------------------------

type ChangeCallback<T> = Box<dyn FnMut(&T, &T)>;

/// A typed value replicated from exactly one writer role to every observer.
///
/// The value is always defined (never partially written). Every accepted
/// write notifies all subscribers exactly once with `(old, new)`, in
/// subscription order, synchronously. Subscribers must not re-enter the
/// variable; follow-up mutation belongs on the caller's event queue.
pub struct ReplicatedVar<T> {
    value: T,
    permission: VarPermission,
    subscribers: Vec<(SubscriptionId, ChangeCallback<T>)>,
    next_subscription: u64,
}

impl<T> ReplicatedVar<T> {
    /// Creates a variable with an initial value and a permission policy.
    pub fn new(initial: T, permission: VarPermission) -> Self {
        Self {
            value: initial,
            permission,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Reads the current value. Always permitted.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the variable's permission policy.
    pub fn permission(&self) -> VarPermission {
        self.permission
    }

    /// Writes a new value on behalf of `principal`.
    ///
    /// Fails with [`ReplicationError::PermissionDenied`] without touching the
    /// value or firing any subscriber if the principal does not satisfy the
    /// write scope. On success subscribers fire once each with `(old, new)`.
    pub fn write(&mut self, new: T, principal: Principal) -> Result<(), ReplicationError> {
        if !self.permission.allows_write(principal) {
            return Err(ReplicationError::PermissionDenied);
        }
        let old = std::mem::replace(&mut self.value, new);
        self.notify(&old);
        Ok(())
    }

    /// Registers a change callback, invoked with `(old, new)` after every
    /// accepted write. Callbacks fire in subscription order.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&T, &T) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes a previously registered callback. Returns `false` if the
    /// subscription was not found.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self, old: &T) {
        for (_, callback) in &mut self.subscribers {
            callback(old, &self.value);
        }
    }
}

impl<T: Serialize + DeserializeOwned> ReplicatedVar<T> {
    /// Serializes the current value for the wire.
    pub fn to_wire(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(&self.value)
    }

    /// Applies a wire payload received from the authoritative writer.
    ///
    /// This is the observer-side synchronization path: the permission check
    /// already happened at the writer, so the payload is applied directly and
    /// subscribers are notified exactly as for a local write.
    pub fn apply_wire(&mut self, bytes: &[u8]) -> Result<(), postcard::Error> {
        let new: T = postcard::from_bytes(bytes)?;
        let old = std::mem::replace(&mut self.value, new);
        self.notify(&old);
        Ok(())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReplicatedVar<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedVar")
            .field("value", &self.value)
            .field("permission", &self.permission)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::ParticipantId;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_unauthorized_write_is_inert() {
        let mut var = ReplicatedVar::new(false, VarPermission::authority_to_everyone());
        let fired = Rc::new(RefCell::new(0));
        let fired_probe = Rc::clone(&fired);
        var.subscribe(move |_, _| *fired_probe.borrow_mut() += 1);

        // A participant hammering an authority-only variable changes nothing
        // and no subscriber fires.
        for _ in 0..5 {
            let result = var.write(true, Principal::Participant(ParticipantId(3)));
            assert_eq!(result, Err(ReplicationError::PermissionDenied));
        }
        assert!(!var.value());
        assert_eq!(*fired.borrow(), 0);
    }

    #[test]
    fn test_accepted_write_notifies_once_with_old_and_new() {
        let mut var = ReplicatedVar::new(10u32, VarPermission::authority_to_everyone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_probe = Rc::clone(&seen);
        var.subscribe(move |old, new| seen_probe.borrow_mut().push((*old, *new)));

        var.write(11, Principal::Authority).unwrap();
        var.write(12, Principal::Authority).unwrap();

        assert_eq!(*seen.borrow(), vec![(10, 11), (11, 12)]);
        assert_eq!(*var.value(), 12);
    }

    #[test]
    fn test_subscribers_fire_in_subscription_order() {
        let mut var = ReplicatedVar::new(0u8, VarPermission::authority_to_everyone());
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order_probe = Rc::clone(&order);
            var.subscribe(move |_, _| order_probe.borrow_mut().push(tag));
        }
        var.write(1, Principal::Authority).unwrap();
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut var = ReplicatedVar::new(0u8, VarPermission::authority_to_everyone());
        let fired = Rc::new(RefCell::new(0));
        let fired_probe = Rc::clone(&fired);
        let sub = var.subscribe(move |_, _| *fired_probe.borrow_mut() += 1);

        var.write(1, Principal::Authority).unwrap();
        assert!(var.unsubscribe(sub));
        assert!(!var.unsubscribe(sub));
        var.write(2, Principal::Authority).unwrap();

        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_owner_write_permission() {
        let owner = ParticipantId(5);
        let mut var = ReplicatedVar::new(false, VarPermission::owner_to_everyone(owner));
        assert!(var.write(true, Principal::Participant(owner)).is_ok());
        assert_eq!(
            var.write(false, Principal::Authority),
            Err(ReplicationError::PermissionDenied)
        );
        assert!(*var.value());
    }

    #[test]
    fn test_wire_apply_notifies_like_a_write() {
        let mut source = ReplicatedVar::new(7u64, VarPermission::authority_to_everyone());
        source.write(99, Principal::Authority).unwrap();

        let mut mirror = ReplicatedVar::new(0u64, VarPermission::authority_to_everyone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_probe = Rc::clone(&seen);
        mirror.subscribe(move |old, new| seen_probe.borrow_mut().push((*old, *new)));

        mirror.apply_wire(&source.to_wire().unwrap()).unwrap();
        assert_eq!(*mirror.value(), 99);
        assert_eq!(*seen.borrow(), vec![(0, 99)]);
    }
}
