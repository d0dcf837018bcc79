//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnamneseError, Result};

/// 未设置分类时的默认分类名
pub const DEFAULT_CATEGORY: &str = "Geral";

/// 由附加问题建议生成的回答所属分类
pub const ADDITIONAL_CATEGORY: &str = "Perguntas Adicionais";

/// 附加问题回答ID前缀
pub const ADDITIONAL_ID_PREFIX: &str = "additional-";

/// PNG 签名数据URI前缀
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// 检查类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExamType {
    Ct,           // 计算机断层扫描
    Mri,          // 磁共振
    Densitometry, // 骨密度
    Mammography,  // 乳腺摄影
}

impl ExamType {
    /// 界面显示名称
    pub fn label(&self) -> &'static str {
        match self {
            ExamType::Ct => "Tomografia Computadorizada",
            ExamType::Mri => "Ressonância Magnética",
            ExamType::Densitometry => "Densitometria",
            ExamType::Mammography => "Mamografia",
        }
    }

    /// 文档中使用的大写代码
    pub fn code(&self) -> &'static str {
        match self {
            ExamType::Ct => "CT",
            ExamType::Mri => "MRI",
            ExamType::Densitometry => "DENSITOMETRY",
            ExamType::Mammography => "MAMMOGRAPHY",
        }
    }
}

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub name: String,
    pub cpf: String, // 国家身份证号 (带格式)
    pub birth_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// 法定监护人信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponsibleInfo {
    pub name: String,
    pub cpf: String,
    pub relationship: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// 问卷条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl QuestionAnswer {
    pub fn new(id: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            answer: answer.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// 分组用的分类名，缺省为 `Geral`
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }

    /// 由已采纳的附加问题建议生成回答
    pub fn from_additional_question(suggestion: &AiSuggestion, answer: &str) -> Self {
        Self {
            id: format!("{}{}", ADDITIONAL_ID_PREFIX, suggestion.id),
            question: suggestion.suggestion.clone(),
            answer: answer.to_string(),
            category: Some(ADDITIONAL_CATEGORY.to_string()),
        }
    }
}

/// 建议类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Correction,
    AdditionalQuestion,
}

impl SuggestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            SuggestionKind::Correction => "Correção",
            SuggestionKind::AdditionalQuestion => "Pergunta Adicional",
        }
    }

    /// 采纳按钮文案
    pub fn action_label(&self) -> &'static str {
        match self {
            SuggestionKind::Correction => "Marcar como Revisado",
            SuggestionKind::AdditionalQuestion => "Adicionar Resposta",
        }
    }
}

/// 建议优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// AI 建议（静态示例数据）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSuggestion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_question_id: Option<String>,
    pub suggestion: String,
    pub reason: String,
    pub priority: Priority,
    #[serde(default)]
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_answer: Option<String>,
}

/// 报告状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    InReview,
    Completed,
}

impl ReportStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pendente",
            ReportStatus::InReview => "Em Revisão",
            ReportStatus::Completed => "Concluído",
        }
    }
}

/// 手写签名，以 PNG 数据URI 形式保存
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(String);

impl Signature {
    pub fn from_data_uri(data_uri: impl Into<String>) -> Result<Self> {
        let data_uri = data_uri.into();
        if !data_uri.starts_with(PNG_DATA_URI_PREFIX) {
            return Err(AnamneseError::Signature(
                "signature must be a PNG data URI".to_string(),
            ));
        }
        if data_uri.len() == PNG_DATA_URI_PREFIX.len() {
            return Err(AnamneseError::Signature("signature payload is empty".to_string()));
        }
        Ok(Self(data_uri))
    }

    pub fn as_data_uri(&self) -> &str {
        &self.0
    }

    /// base64 负载部分
    pub fn payload(&self) -> &str {
        &self.0[PNG_DATA_URI_PREFIX.len()..]
    }
}

impl TryFrom<String> for Signature {
    type Error = AnamneseError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_data_uri(value)
    }
}

impl From<Signature> for String {
    fn from(value: Signature) -> Self {
        value.0
    }
}

/// 问卷报告
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub exam_type: ExamType,
    pub patient: PatientInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible: Option<ResponsibleInfo>,
    pub answers: Vec<QuestionAnswer>,
    #[serde(default)]
    pub ai_suggestions: Vec<AiSuggestion>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Report {
    /// 按ID查找本报告的建议
    pub fn suggestion(&self, suggestion_id: &str) -> Option<&AiSuggestion> {
        self.ai_suggestions.iter().find(|s| s.id == suggestion_id)
    }
}

/// 步骤状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,  // 未开始
    Active,   // 当前步骤
    Complete, // 已完成
}

/// 工作流步骤
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowStep {
    pub id: u8,
    pub title: String,
    pub description: String,
    pub status: StepStatus,
}
