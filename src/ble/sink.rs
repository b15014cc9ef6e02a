//! Notification delivery to the application.
//!
//! Notifications arrive in BLE callback context, which must not block.
//! [`NotificationChannel`] copies them into a bounded embassy channel for a
//! consumer task; when the consumer falls behind, payloads are dropped.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use crate::config::{NOTIFY_CHANNEL_DEPTH, NOTIFY_MAX_LEN};

/// Receives every notification matched to a live peer slot.
pub trait NotificationSink {
    fn on_notification(&self, slot: usize, value: &[u8]);
}

impl<S: NotificationSink + ?Sized> NotificationSink for &S {
    fn on_notification(&self, slot: usize, value: &[u8]) {
        (**self).on_notification(slot, value)
    }
}

/// A notification copied out of the stack's buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Notification {
    pub slot: usize,
    pub value: Vec<u8, NOTIFY_MAX_LEN>,
}

impl Notification {
    /// Copies `value`, truncating anything past `NOTIFY_MAX_LEN`.
    pub fn new(slot: usize, value: &[u8]) -> Self {
        if value.len() > NOTIFY_MAX_LEN {
            warn!(
                "Notification from peer {} truncated ({} > {} bytes)",
                slot,
                value.len(),
                NOTIFY_MAX_LEN
            );
        }
        let mut buf = Vec::new();
        let _ = buf.extend_from_slice(&value[..value.len().min(NOTIFY_MAX_LEN)]);
        Self { slot, value: buf }
    }
}

/// Bounded hand-off from BLE callbacks to a consumer task.
pub struct NotificationChannel<const CAP: usize = NOTIFY_CHANNEL_DEPTH> {
    channel: Channel<CriticalSectionRawMutex, Notification, CAP>,
}

impl<const CAP: usize> Default for NotificationChannel<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> NotificationChannel<CAP> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Waits for the next notification.
    pub async fn receive(&self) -> Notification {
        self.channel.receive().await
    }

    pub fn try_receive(&self) -> Option<Notification> {
        self.channel.try_receive().ok()
    }
}

impl<const CAP: usize> NotificationSink for NotificationChannel<CAP> {
    fn on_notification(&self, slot: usize, value: &[u8]) {
        // try_send avoids blocking; if the consumer is behind, we drop.
        if self.channel.try_send(Notification::new(slot, value)).is_err() {
            warn!("Notification channel full - dropping payload from peer {}", slot);
        }
    }
}

/// Dumps every payload to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn on_notification(&self, slot: usize, value: &[u8]) {
        info!("Notify from peer {}: {:?}", slot, value);
    }
}
