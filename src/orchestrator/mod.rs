//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把各层能力串成用户操作，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::Controller (上传 / 结果 / 标注 / 导出)
//!     ↓
//! workflow::PollingEngine (单个任务的轮询状态机)
//!     ↓
//! services (能力层：标注存储 / 学习笔记 / 测验 / 闪卡)
//!     ↓
//! clients + session (后端接口 / 当前任务上下文)
//!     ↓
//! infrastructure (基础设施：FetchGateway / KeyValueStore)
//! ```
//!
//! ## 设计原则
//!
//! 1. **唯一调度者**：只有编排层 spawn 后台任务
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **单一出口**：所有用户可见的提示都通过 `UiChannel`

pub mod controller;

pub use controller::Controller;
