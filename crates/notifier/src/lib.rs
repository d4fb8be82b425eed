//! Push notification delivery: the gateway contract, the FCM HTTP v1 client,
//! and the timeout-bounded dispatcher used by the notification pipeline.

pub mod dispatch;
pub mod fcm;
pub mod gateway;

pub use dispatch::{DispatchGateway, DispatchState};
pub use fcm::FcmGateway;
pub use gateway::PushGateway;
