//! Concrete [`BlogPlatform`](crate::publish::BlogPlatform) and
//! [`NotifyChannel`](crate::publish::NotifyChannel) implementations.

pub mod blogger;
pub mod telegram;
