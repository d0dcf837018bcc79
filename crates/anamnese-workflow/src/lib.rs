//! # 问卷审核工作流模块
//!
//! 提供审核流程的全部有状态逻辑，包括：
//! - 步骤状态机：四个固定步骤的位置与状态
//! - 工作流控制器：选择报告、编辑回答、处理建议、采集签名、完成与重置
//! - 报告查询：按 CPF 查找报告，带序号防止过期结果覆盖
//! - 步骤视图：查询、编辑、复核、签名四个步骤的视图模型

pub mod engine;
pub mod lookup;
pub mod state_machine;
pub mod views;

// 重新导出主要类型
pub use engine::{AcceptedSuggestion, WorkflowController, WorkflowState};
pub use lookup::{InMemoryReportRepository, LookupSettings, ReportLookup, ReportRepository};
pub use state_machine::{BackNavigation, Step, StepStateMachine};
pub use views::{
    group_by_category, CategoryGroup, EditView, PatientSummary, ReportCard, ReviewView,
    SearchTicket, SearchView, SignView, StepperItem,
};
