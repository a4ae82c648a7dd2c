//! # Lecture Mind Client
//!
//! 讲座视频分析服务的客户端：上传视频、跟踪处理进度、展示结果，并在本地保存学习标注
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有网络客户端与本地存储，只暴露能力
//! - `FetchGateway` - 所有网络请求的超时与取消
//! - `KeyValueStore` - 字符串键值持久化（文件 / 内存）
//!
//! ### ② 接口与会话（Clients / Session）
//! - `clients/` - 后端 REST 接口（`JobApi` / `LectureClient`）
//! - `session/` - 当前任务 id、取消令牌、结果缓存、预览资源
//!
//! ### ③ 业务能力层（Services）
//! - `AnnotationStore` - 书签、困惑投票、困惑标记、笔记、主题
//! - `study_notes` / `quiz` / `flashcards` - 学习工具
//!
//! ### ④ 流程层（Workflow）
//! - `PollingEngine` - 单个任务的轮询状态机
//!
//! ### ⑤ 编排层（Orchestration）
//! - `Controller` - 串联上传、轮询、结果、标注与导出
//!
//! ### 视图（View）
//! - `view/` - 状态到视图模型的纯映射，`UiChannel` 推送 `UiEvent`
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod utils;
pub mod view;
pub mod workflow;

// 重新导出常用类型
pub use clients::{JobApi, LectureClient, StatusReply};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{FileStore, KeyValueStore, MemoryStore};
pub use orchestrator::Controller;
pub use session::{FilePreview, JobSession, MediaPreview};
pub use view::{Notification, Severity, UiChannel, UiEvent};
pub use workflow::{PollState, PollingEngine};
