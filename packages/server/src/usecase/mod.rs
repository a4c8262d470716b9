//! UseCase 層
//!
//! プロデューサ向けの操作を実装するレイヤー。
//! UI 層から呼び出され、Domain 層のバッファと Hub を操作します。

pub mod dashboard;

pub use dashboard::{CAMERA_SLOTS, CONVERSATION_CAPACITY, Dashboard, LOG_CAPACITY};
