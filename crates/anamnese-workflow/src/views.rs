//! 步骤视图模型
//!
//! 每个视图只读取控制器状态，通过控制器的命名操作发起修改。视图自身只保存
//! 临时的界面状态（输入中的 CPF、正在编辑的问题、草稿回答、分类展开状态），
//! 离开步骤时随视图一起丢弃。

use std::collections::{HashMap, HashSet};

use anamnese_core::utils::{
    format_cpf, format_long_date_pt, format_short_date_pt, is_searchable, or_placeholder,
};
use anamnese_core::{
    AiSuggestion, AnamneseError, Priority, QuestionAnswer, Report, Result, StepStatus,
    SuggestionKind,
};
use serde::Serialize;

use crate::engine::WorkflowController;
use crate::lookup::ReportLookup;
use crate::state_machine::Step;

/// 编辑步骤中缺失字段的占位文本
pub const EDIT_PLACEHOLDER: &str = "Não informado";

/// 复核步骤中缺失字段的占位文本
pub const REVIEW_PLACEHOLDER: &str = "-";

const EXPAND_ALL: &str = "all";

/// 按分类分组的回答
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub name: String,
    pub answers: Vec<QuestionAnswer>,
}

/// 按 `category` 分组，分组顺序为首次出现的顺序
pub fn group_by_category(answers: &[QuestionAnswer]) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();

    for qa in answers {
        let name = qa.category_or_default();
        match groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.answers.push(qa.clone()),
            None => groups.push(CategoryGroup {
                name: name.to_string(),
                answers: vec![qa.clone()],
            }),
        }
    }

    groups
}

// ---------------------------------------------------------------------------
// 步骤导航条
// ---------------------------------------------------------------------------

/// 步骤导航条中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepperItem {
    pub id: u8,
    pub title: String,
    pub description: String,
    pub status: StepStatus,
    /// 只有已完成的步骤可以点击返回
    pub clickable: bool,
    /// 通向本步骤的连接线是否点亮
    pub connector_lit: bool,
}

pub fn stepper(controller: &WorkflowController) -> Vec<StepperItem> {
    controller
        .steps()
        .iter()
        .enumerate()
        .map(|(index, step)| StepperItem {
            id: step.id,
            title: step.title.clone(),
            description: step.description.clone(),
            status: step.status,
            clickable: step.status == StepStatus::Complete,
            connector_lit: index > 0
                && matches!(step.status, StepStatus::Complete | StepStatus::Active),
        })
        .collect()
}

/// 点击导航条中的步骤，未完成的步骤不响应
pub fn click_step(controller: &mut WorkflowController, step_id: u8) -> Result<Option<Step>> {
    let clickable = controller
        .steps()
        .iter()
        .any(|s| s.id == step_id && s.status == StepStatus::Complete);

    if !clickable {
        return Ok(None);
    }
    controller.go_to_step(step_id as i64).map(Some)
}

// ---------------------------------------------------------------------------
// 患者信息
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponsibleSummary {
    pub name: String,
    pub relationship: String,
    pub cpf: String,
}

/// 患者信息块
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
    pub name: String,
    pub cpf: String,
    pub birth_date: String,
    pub phone: String,
    pub exam_label: String,
    pub responsible: Option<ResponsibleSummary>,
}

impl PatientSummary {
    pub fn from_report(report: &Report, placeholder: &str) -> Self {
        Self {
            name: report.patient.name.clone(),
            cpf: report.patient.cpf.clone(),
            birth_date: format_short_date_pt(&report.patient.birth_date),
            phone: or_placeholder(report.patient.phone.as_deref(), placeholder).to_string(),
            exam_label: report.exam_type.label().to_string(),
            responsible: report.responsible.as_ref().map(|r| ResponsibleSummary {
                name: r.name.clone(),
                relationship: r.relationship.clone(),
                cpf: r.cpf.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// 步骤 1: 查询
// ---------------------------------------------------------------------------

/// 查询结果卡片
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportCard {
    pub report_id: String,
    pub patient_name: String,
    pub exam_label: String,
    pub cpf: String,
    pub created_label: String,
    pub status_label: String,
    pub suggestion_note: Option<String>,
}

impl ReportCard {
    pub fn from_report(report: &Report) -> Self {
        let count = report.ai_suggestions.len();
        Self {
            report_id: report.id.clone(),
            patient_name: report.patient.name.clone(),
            exam_label: report.exam_type.label().to_string(),
            cpf: report.patient.cpf.clone(),
            created_label: format_long_date_pt(&report.created_at),
            status_label: report.status.label().to_string(),
            suggestion_note: (count > 0).then(|| format!("{} sugestões de IA", count)),
        }
    }
}

/// 一次查询请求的序号凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    seq: u64,
    key: String,
}

impl SearchTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// 查询步骤视图
#[derive(Debug, Default)]
pub struct SearchView {
    input: String,
    results: Vec<Report>,
    has_searched: bool,
    is_searching: bool,
    last_error: Option<String>,
    latest_seq: u64,
}

impl SearchView {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入时套用 CPF 掩码
    pub fn set_input(&mut self, raw: &str) {
        self.input = format_cpf(raw);
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn results(&self) -> &[Report] {
        &self.results
    }

    pub fn has_searched(&self) -> bool {
        self.has_searched
    }

    pub fn is_searching(&self) -> bool {
        self.is_searching
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 查询按钮是否可用
    pub fn can_search(&self, min_digits: usize) -> bool {
        is_searchable(&self.input, min_digits) && !self.is_searching
    }

    /// 开始一次查询，输入不足时不发出请求
    pub fn begin_search(&mut self, min_digits: usize) -> Option<SearchTicket> {
        if !is_searchable(&self.input, min_digits) {
            return None;
        }

        self.latest_seq += 1;
        self.is_searching = true;
        self.has_searched = true;

        Some(SearchTicket {
            seq: self.latest_seq,
            key: self.input.clone(),
        })
    }

    /// 写入查询结果；过期请求的结果被丢弃并返回 false
    pub fn finish_search(&mut self, ticket: SearchTicket, outcome: Result<Vec<Report>>) -> bool {
        if ticket.seq != self.latest_seq {
            tracing::debug!("Dropped stale search result for {}", ticket.key);
            return false;
        }

        self.is_searching = false;
        match outcome {
            Ok(results) => {
                self.results = results;
                self.last_error = None;
            }
            Err(e) => {
                tracing::warn!("Search for {} failed: {}", ticket.key, e);
                self.results.clear();
                self.last_error = Some(e.to_string());
            }
        }
        true
    }

    /// 发起并等待一次查询
    pub async fn search(&mut self, lookup: &ReportLookup) -> bool {
        let Some(ticket) = self.begin_search(lookup.settings().min_digits) else {
            return false;
        };
        let outcome = lookup.search(ticket.key()).await;
        self.finish_search(ticket, outcome)
    }

    pub fn cards(&self) -> Vec<ReportCard> {
        self.results.iter().map(ReportCard::from_report).collect()
    }

    /// 结果摘要文本，尚未查询时为 None
    pub fn summary(&self) -> Option<String> {
        if !self.has_searched || self.is_searching {
            return None;
        }
        if self.last_error.is_some() {
            return Some("Falha ao buscar relatórios".to_string());
        }
        if self.results.is_empty() {
            Some("Nenhum relatório encontrado".to_string())
        } else {
            Some(format!("{} relatório(s) encontrado(s)", self.results.len()))
        }
    }

    /// 选择结果中的报告并进入编辑步骤
    pub fn select(&self, report_id: &str, controller: &mut WorkflowController) -> Result<()> {
        let report = self
            .results
            .iter()
            .find(|r| r.id == report_id)
            .ok_or_else(|| AnamneseError::NotFound(format!("Report {} not in results", report_id)))?;
        controller.select_report(report.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 步骤 2: 编辑
// ---------------------------------------------------------------------------

/// 编辑步骤中的分类区块
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySection {
    pub name: String,
    pub answers: Vec<QuestionAnswer>,
    pub expanded: bool,
}

impl CategorySection {
    pub fn count_label(&self) -> String {
        format!("{} pergunta(s)", self.answers.len())
    }
}

/// 建议卡片
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionCard {
    pub id: String,
    pub kind_label: String,
    pub action_label: String,
    pub text: String,
    pub reason: String,
    pub priority: Priority,
    pub needs_answer: bool,
    pub draft: String,
    pub can_apply: bool,
}

/// 编辑步骤视图
#[derive(Debug)]
pub struct EditView {
    editing: Option<String>,
    drafts: HashMap<String, String>,
    expanded: HashSet<String>,
}

impl EditView {
    pub fn new() -> Self {
        Self {
            editing: None,
            drafts: HashMap::new(),
            expanded: HashSet::from([EXPAND_ALL.to_string()]),
        }
    }

    pub fn patient(&self, controller: &WorkflowController) -> Option<PatientSummary> {
        controller
            .selected_report()
            .map(|r| PatientSummary::from_report(r, EDIT_PLACEHOLDER))
    }

    pub fn sections(&self, controller: &WorkflowController) -> Vec<CategorySection> {
        group_by_category(controller.edited_answers())
            .into_iter()
            .map(|group| CategorySection {
                expanded: self.is_expanded(&group.name),
                name: group.name,
                answers: group.answers,
            })
            .collect()
    }

    pub fn is_expanded(&self, category: &str) -> bool {
        self.expanded.contains(EXPAND_ALL) || self.expanded.contains(category)
    }

    /// 切换分类展开状态
    pub fn toggle_category(&mut self, category: &str, controller: &WorkflowController) {
        if self.expanded.remove(EXPAND_ALL) {
            // 把“全部展开”展开成显式集合，之后才能单独折叠
            for group in group_by_category(controller.edited_answers()) {
                self.expanded.insert(group.name);
            }
        }

        if !self.expanded.remove(category) {
            self.expanded.insert(category.to_string());
        }
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn start_editing(&mut self, question_id: &str) {
        self.editing = Some(question_id.to_string());
    }

    /// 提交编辑并结束编辑状态
    pub fn commit_edit(&mut self, controller: &mut WorkflowController, answer: &str) -> bool {
        match self.editing.take() {
            Some(question_id) => controller.update_answer(&question_id, answer),
            None => false,
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn set_draft(&mut self, suggestion_id: &str, text: &str) {
        self.drafts.insert(suggestion_id.to_string(), text.to_string());
    }

    pub fn draft(&self, suggestion_id: &str) -> &str {
        self.drafts.get(suggestion_id).map(String::as_str).unwrap_or("")
    }

    /// 附加问题需要非空草稿；纠正类建议总是可以标记
    pub fn can_apply(&self, suggestion: &AiSuggestion) -> bool {
        match suggestion.kind {
            SuggestionKind::Correction => true,
            SuggestionKind::AdditionalQuestion => !self.draft(&suggestion.id).trim().is_empty(),
        }
    }

    pub fn suggestion_cards(&self, controller: &WorkflowController) -> Vec<SuggestionCard> {
        controller
            .pending_suggestions()
            .into_iter()
            .map(|s| SuggestionCard {
                id: s.id.clone(),
                kind_label: s.kind.label().to_string(),
                action_label: s.kind.action_label().to_string(),
                text: s.suggestion.clone(),
                reason: s.reason.clone(),
                priority: s.priority,
                needs_answer: s.kind == SuggestionKind::AdditionalQuestion,
                draft: self.draft(&s.id).to_string(),
                can_apply: self.can_apply(s),
            })
            .collect()
    }

    /// 待处理数量标记，全部处理完时为 None
    pub fn pending_badge(&self, controller: &WorkflowController) -> Option<String> {
        let pending = controller.pending_suggestions().len();
        (pending > 0).then(|| format!("{} pendente(s)", pending))
    }

    /// 采纳建议，成功后清除对应草稿
    pub fn apply(&mut self, controller: &mut WorkflowController, suggestion_id: &str) -> Result<()> {
        let suggestion = controller
            .pending_suggestions()
            .into_iter()
            .find(|s| s.id == suggestion_id)
            .cloned()
            .ok_or_else(|| {
                AnamneseError::NotFound(format!("Suggestion {} is not pending", suggestion_id))
            })?;

        match suggestion.kind {
            SuggestionKind::AdditionalQuestion => {
                let draft = self.draft(&suggestion.id).to_string();
                controller.apply_suggestion(&suggestion, Some(&draft))?;
                self.drafts.remove(&suggestion.id);
            }
            SuggestionKind::Correction => controller.apply_suggestion(&suggestion, None)?,
        }
        Ok(())
    }

    pub fn dismiss(&mut self, controller: &mut WorkflowController, suggestion_id: &str) {
        controller.dismiss_suggestion(suggestion_id);
        self.drafts.remove(suggestion_id);
    }

    pub fn continue_to_review(&self, controller: &mut WorkflowController) -> Result<Step> {
        controller.go_to_step(Step::Review.id() as i64)
    }

    /// 返回查询会放弃整个会话
    pub fn back_to_search(&self, controller: &mut WorkflowController) {
        controller.reset_workflow();
    }
}

impl Default for EditView {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// 步骤 3: 复核
// ---------------------------------------------------------------------------

/// 复核步骤视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    pub patient: PatientSummary,
    pub groups: Vec<CategoryGroup>,
}

impl ReviewView {
    pub fn build(controller: &WorkflowController) -> Result<Self> {
        let report = controller
            .selected_report()
            .ok_or(AnamneseError::NoReportSelected)?;

        Ok(Self {
            patient: PatientSummary::from_report(report, REVIEW_PLACEHOLDER),
            groups: group_by_category(&controller.all_answers()),
        })
    }

    pub fn continue_to_signature(controller: &mut WorkflowController) -> Result<Step> {
        controller.go_to_step(Step::Sign.id() as i64)
    }

    pub fn back_to_edit(controller: &mut WorkflowController) -> Result<Step> {
        controller.go_to_step(Step::Edit.id() as i64)
    }
}

// ---------------------------------------------------------------------------
// 步骤 4: 签名
// ---------------------------------------------------------------------------

pub const PATIENT_SIGNATURE_LABEL: &str = "Assinatura do Paciente/Responsável";
pub const TECHNICIAN_SIGNATURE_LABEL: &str = "Assinatura do Técnico";

/// 签名步骤视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignView {
    pub patient_captured: bool,
    pub technician_captured: bool,
    pub can_complete: bool,
    pub answer_count: usize,
}

impl SignView {
    pub fn build(controller: &WorkflowController) -> Self {
        Self {
            patient_captured: controller.patient_signature().is_some(),
            technician_captured: controller.technician_signature().is_some(),
            can_complete: controller.can_complete(),
            answer_count: controller.all_answers().len(),
        }
    }

    pub fn status_message(&self) -> Option<&'static str> {
        self.can_complete.then_some("Ambas assinaturas coletadas")
    }

    pub fn back_to_review(controller: &mut WorkflowController) -> Result<Step> {
        controller.go_to_step(Step::Review.id() as i64)
    }
}
