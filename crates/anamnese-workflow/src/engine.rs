//! 工作流控制器
//!
//! 持有一次审核会话的全部可变状态，所有修改都经由这里的命名操作完成

use anamnese_core::{
    AiSuggestion, AnamneseError, QuestionAnswer, Report, ReportStatus, Result, Signature,
    SuggestionKind, WorkflowStep,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state_machine::{BackNavigation, Step, StepStateMachine};

/// 已采纳的建议
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedSuggestion {
    pub suggestion_id: String,
    pub answer: Option<String>,
}

/// 会话状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub steps: StepStateMachine,
    pub selected_report: Option<Report>,
    pub edited_answers: Vec<QuestionAnswer>,
    pub accepted: Vec<AcceptedSuggestion>,
    pub patient_signature: Option<Signature>,
    pub technician_signature: Option<Signature>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 工作流控制器
#[derive(Debug, Default)]
pub struct WorkflowController {
    state: WorkflowState,
    back_navigation: BackNavigation,
}

impl WorkflowController {
    /// 创建新的工作流控制器
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_back_navigation(back_navigation: BackNavigation) -> Self {
        Self {
            state: WorkflowState::new(),
            back_navigation,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn current_step(&self) -> Step {
        self.state.steps.current()
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        self.state.steps.steps()
    }

    pub fn selected_report(&self) -> Option<&Report> {
        self.state.selected_report.as_ref()
    }

    pub fn edited_answers(&self) -> &[QuestionAnswer] {
        &self.state.edited_answers
    }

    pub fn patient_signature(&self) -> Option<&Signature> {
        self.state.patient_signature.as_ref()
    }

    pub fn technician_signature(&self) -> Option<&Signature> {
        self.state.technician_signature.as_ref()
    }

    /// 跳转到指定步骤，目标不在 [1,4] 时状态不变
    pub fn go_to_step(&mut self, step_id: i64) -> Result<Step> {
        match self.state.steps.transition(step_id, self.back_navigation) {
            Ok(step) => {
                tracing::info!("Workflow moved to step {} ({})", step.id(), step.title());
                Ok(step)
            }
            Err(e) => {
                tracing::warn!("Rejected step transition: {}", e);
                Err(e)
            }
        }
    }

    /// 选择报告：清空之前的编辑与签名状态并进入编辑步骤
    pub fn select_report(&mut self, report: Report) {
        tracing::info!(
            "Selected report {} for patient {} ({} answers, {} suggestions)",
            report.id,
            report.patient.name,
            report.answers.len(),
            report.ai_suggestions.len()
        );

        self.state.edited_answers = report.answers.clone();
        self.state.selected_report = Some(report);
        self.state.accepted.clear();
        self.state.patient_signature = None;
        self.state.technician_signature = None;

        let moved = self.go_to_step(Step::Edit.id() as i64);
        debug_assert!(moved.is_ok(), "step 2 is always a valid target");
    }

    /// 修改指定问题的回答，ID 不存在时返回 false 且不做修改
    pub fn update_answer(&mut self, question_id: &str, answer: &str) -> bool {
        match self
            .state
            .edited_answers
            .iter_mut()
            .find(|qa| qa.id == question_id)
        {
            Some(qa) => {
                qa.answer = answer.to_string();
                tracing::debug!("Updated answer for question {}", question_id);
                true
            }
            None => {
                tracing::warn!("Ignored update for unknown question {}", question_id);
                false
            }
        }
    }

    /// 采纳建议
    ///
    /// 附加问题必须带非空回答；纠正类建议只记录为已处理，回答本身通过
    /// [`update_answer`](Self::update_answer) 手动修改。重复采纳不产生效果。
    pub fn apply_suggestion(&mut self, suggestion: &AiSuggestion, answer: Option<&str>) -> Result<()> {
        let report = self
            .state
            .selected_report
            .as_ref()
            .ok_or(AnamneseError::NoReportSelected)?;

        if report.suggestion(&suggestion.id).is_none() {
            return Err(AnamneseError::NotFound(format!(
                "Suggestion {} not found in report {}",
                suggestion.id, report.id
            )));
        }

        if self.is_applied(&suggestion.id) {
            tracing::debug!("Suggestion {} already applied", suggestion.id);
            return Ok(());
        }

        // 只在判空时去掉空白，保存原样输入
        let answer = answer.filter(|a| !a.trim().is_empty());
        if suggestion.kind == SuggestionKind::AdditionalQuestion && answer.is_none() {
            return Err(AnamneseError::Validation(format!(
                "Additional question {} requires an answer",
                suggestion.id
            )));
        }

        self.state.accepted.push(AcceptedSuggestion {
            suggestion_id: suggestion.id.clone(),
            answer: answer.map(str::to_string),
        });

        tracing::info!("Applied {:?} suggestion {}", suggestion.kind, suggestion.id);
        Ok(())
    }

    /// 撤销或拒绝建议，保证其不再计为已采纳
    pub fn dismiss_suggestion(&mut self, suggestion_id: &str) {
        let before = self.state.accepted.len();
        self.state.accepted.retain(|a| a.suggestion_id != suggestion_id);

        if self.state.accepted.len() != before {
            tracing::info!("Dismissed applied suggestion {}", suggestion_id);
        }
    }

    pub fn is_applied(&self, suggestion_id: &str) -> bool {
        self.state
            .accepted
            .iter()
            .any(|a| a.suggestion_id == suggestion_id)
    }

    /// 已采纳的建议（按采纳顺序），带 `applied` 标记和采集到的回答
    pub fn applied_suggestions(&self) -> Vec<AiSuggestion> {
        let Some(report) = self.state.selected_report.as_ref() else {
            return Vec::new();
        };

        self.state
            .accepted
            .iter()
            .filter_map(|accepted| {
                report.suggestion(&accepted.suggestion_id).map(|s| AiSuggestion {
                    applied: true,
                    new_answer: accepted.answer.clone(),
                    ..s.clone()
                })
            })
            .collect()
    }

    /// 尚未采纳的建议，保持报告中的顺序
    pub fn pending_suggestions(&self) -> Vec<&AiSuggestion> {
        self.state
            .selected_report
            .as_ref()
            .map(|report| {
                report
                    .ai_suggestions
                    .iter()
                    .filter(|s| !self.is_applied(&s.id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 由已采纳的附加问题生成的回答
    pub fn additional_answers(&self) -> Vec<QuestionAnswer> {
        self.applied_suggestions()
            .iter()
            .filter(|s| s.kind == SuggestionKind::AdditionalQuestion)
            .filter_map(|s| {
                s.new_answer
                    .as_deref()
                    .map(|answer| QuestionAnswer::from_additional_question(s, answer))
            })
            .collect()
    }

    /// 合并后的回答：编辑后的原始回答在前，附加问题回答在后
    pub fn all_answers(&self) -> Vec<QuestionAnswer> {
        let mut answers = self.state.edited_answers.clone();
        answers.extend(self.additional_answers());
        answers
    }

    pub fn set_patient_signature(&mut self, signature: Option<Signature>) {
        tracing::debug!("Patient signature {}", if signature.is_some() { "captured" } else { "cleared" });
        self.state.patient_signature = signature;
    }

    pub fn set_technician_signature(&mut self, signature: Option<Signature>) {
        tracing::debug!("Technician signature {}", if signature.is_some() { "captured" } else { "cleared" });
        self.state.technician_signature = signature;
    }

    /// 两个签名均已采集
    pub fn can_complete(&self) -> bool {
        self.state.patient_signature.is_some() && self.state.technician_signature.is_some()
    }

    /// 生成最终报告副本，不修改会话状态
    pub fn complete_report(&self) -> Result<Report> {
        let report = self
            .state
            .selected_report
            .as_ref()
            .ok_or(AnamneseError::NoReportSelected)?;

        Ok(Report {
            answers: self.all_answers(),
            status: ReportStatus::Completed,
            patient_signature: self.state.patient_signature.clone(),
            technician_signature: self.state.technician_signature.clone(),
            completed_at: Some(Utc::now()),
            ..report.clone()
        })
    }

    /// 完成报告并交给导出步骤处理，成功后重置会话
    ///
    /// 导出失败时会话保持不变，可以重试。
    pub fn finish<T, F>(&mut self, export: F) -> Result<(Report, T)>
    where
        F: FnOnce(&Report) -> Result<T>,
    {
        if !self.can_complete() {
            return Err(AnamneseError::Validation(
                "Both signatures are required to finish the report".to_string(),
            ));
        }

        let report = self.complete_report()?;
        let output = export(&report)?;

        tracing::info!("Report {} completed", report.id);
        self.reset_workflow();
        Ok((report, output))
    }

    /// 恢复初始状态
    pub fn reset_workflow(&mut self) {
        self.state = WorkflowState::new();
        tracing::info!("Workflow reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnese_core::{ExamType, PatientInfo, Priority, StepStatus, ADDITIONAL_CATEGORY};
    use chrono::NaiveDate;

    fn suggestion(id: &str, kind: SuggestionKind) -> AiSuggestion {
        AiSuggestion {
            id: id.to_string(),
            kind,
            original_question_id: None,
            suggestion: format!("Pergunta {}", id),
            reason: "Motivo".to_string(),
            priority: Priority::Medium,
            applied: false,
            new_answer: None,
        }
    }

    fn report() -> Report {
        Report {
            id: "r1".to_string(),
            exam_type: ExamType::Ct,
            patient: PatientInfo {
                name: "Maria".to_string(),
                cpf: "123.456.789-00".to_string(),
                birth_date: NaiveDate::from_ymd_opt(1985, 3, 15).unwrap(),
                phone: None,
                email: None,
            },
            responsible: None,
            answers: vec![
                QuestionAnswer::new("q1", "Fuma?", "Não").with_category("Geral"),
                QuestionAnswer::new("q2", "Bebe?", "Às vezes").with_category("Geral"),
                QuestionAnswer::new("q3", "Cirurgias?", "Nenhuma").with_category("Histórico"),
            ],
            ai_suggestions: vec![
                suggestion("s1", SuggestionKind::AdditionalQuestion),
                suggestion("s2", SuggestionKind::Correction),
                suggestion("s3", SuggestionKind::AdditionalQuestion),
            ],
            status: ReportStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
            technician_id: None,
            technician_name: None,
            patient_signature: None,
            technician_signature: None,
            completed_at: None,
        }
    }

    fn signature() -> Signature {
        Signature::from_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap()
    }

    #[test]
    fn test_invalid_step_leaves_state_unchanged() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());
        wf.update_answer("q1", "Sim");
        let before = wf.state().clone();

        for target in [0, 5, -3] {
            assert!(wf.go_to_step(target).is_err());
            assert_eq!(wf.state(), &before);
        }
    }

    #[test]
    fn test_select_report_copies_answers() {
        let mut wf = WorkflowController::new();
        let original = report();
        wf.select_report(original.clone());

        assert_eq!(wf.current_step(), Step::Edit);
        assert_eq!(wf.edited_answers(), original.answers.as_slice());

        wf.update_answer("q1", "Sim");
        assert_eq!(wf.selected_report().unwrap().answers[0].answer, "Não");
        assert_eq!(wf.edited_answers()[0].answer, "Sim");
    }

    #[test]
    fn test_select_report_clears_previous_session() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());
        wf.apply_suggestion(&suggestion("s2", SuggestionKind::Correction), None).unwrap();
        wf.set_patient_signature(Some(signature()));
        wf.go_to_step(4).unwrap();

        wf.select_report(report());
        assert!(wf.applied_suggestions().is_empty());
        assert!(wf.patient_signature().is_none());
        assert_eq!(wf.current_step(), Step::Edit);
    }

    #[test]
    fn test_update_answer_touches_only_target() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());
        let before = wf.edited_answers().to_vec();

        assert!(wf.update_answer("q2", "Nunca"));
        let after = wf.edited_answers().to_vec();
        assert_eq!(after.len(), before.len());
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1].answer, "Nunca");
        assert_eq!(after[1].id, "q2");
        assert_eq!(after[2], before[2]);

        assert!(!wf.update_answer("missing", "x"));
        assert_eq!(wf.edited_answers(), after.as_slice());
    }

    #[test]
    fn test_apply_additional_question() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());

        wf.apply_suggestion(&suggestion("s1", SuggestionKind::AdditionalQuestion), Some("Sim"))
            .unwrap();

        let additional = wf.additional_answers();
        assert_eq!(additional.len(), 1);
        assert_eq!(additional[0].id, "additional-s1");
        assert_eq!(additional[0].category.as_deref(), Some(ADDITIONAL_CATEGORY));
        assert_eq!(additional[0].answer, "Sim");

        let applied = wf.applied_suggestions();
        assert_eq!(applied.len(), 1);
        assert!(applied[0].applied);
        assert_eq!(applied[0].new_answer.as_deref(), Some("Sim"));
    }

    #[test]
    fn test_apply_additional_question_without_answer_changes_nothing() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());
        let s1 = suggestion("s1", SuggestionKind::AdditionalQuestion);

        for answer in [None, Some(""), Some("   ")] {
            let result = wf.apply_suggestion(&s1, answer);
            assert!(matches!(result, Err(AnamneseError::Validation(_))));
            assert!(wf.applied_suggestions().is_empty());
            assert!(wf.additional_answers().is_empty());
        }
    }

    #[test]
    fn test_apply_keeps_answer_as_typed() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());

        wf.apply_suggestion(
            &suggestion("s1", SuggestionKind::AdditionalQuestion),
            Some("  Sim, desde 2019 "),
        )
        .unwrap();

        assert_eq!(wf.additional_answers()[0].answer, "  Sim, desde 2019 ");
        assert_eq!(
            wf.applied_suggestions()[0].new_answer.as_deref(),
            Some("  Sim, desde 2019 ")
        );
    }

    #[test]
    fn test_select_report_from_any_step_lands_on_edit() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());
        wf.go_to_step(3).unwrap();

        wf.select_report(report());
        assert_eq!(wf.current_step(), Step::Edit);
        let active = wf
            .steps()
            .iter()
            .filter(|s| s.status == StepStatus::Active)
            .count();
        assert_eq!(active, 1);
        assert_eq!(wf.steps()[1].status, StepStatus::Active);
    }

    #[test]
    fn test_apply_correction_records_only() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());

        wf.apply_suggestion(&suggestion("s2", SuggestionKind::Correction), None).unwrap();
        assert_eq!(wf.applied_suggestions().len(), 1);
        assert!(wf.additional_answers().is_empty());
        assert_eq!(wf.all_answers(), wf.edited_answers().to_vec());
    }

    #[test]
    fn test_apply_is_at_most_once_and_scoped_to_report() {
        let mut wf = WorkflowController::new();
        let s1 = suggestion("s1", SuggestionKind::AdditionalQuestion);

        assert!(matches!(
            wf.apply_suggestion(&s1, Some("Sim")),
            Err(AnamneseError::NoReportSelected)
        ));

        wf.select_report(report());
        wf.apply_suggestion(&s1, Some("Sim")).unwrap();
        wf.apply_suggestion(&s1, Some("Não")).unwrap();
        assert_eq!(wf.applied_suggestions().len(), 1);
        assert_eq!(wf.additional_answers()[0].answer, "Sim");

        let foreign = suggestion("zz", SuggestionKind::Correction);
        assert!(matches!(
            wf.apply_suggestion(&foreign, None),
            Err(AnamneseError::NotFound(_))
        ));
    }

    #[test]
    fn test_dismiss_is_idempotent() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());
        wf.apply_suggestion(&suggestion("s2", SuggestionKind::Correction), None).unwrap();
        wf.apply_suggestion(&suggestion("s1", SuggestionKind::AdditionalQuestion), Some("Sim"))
            .unwrap();

        wf.dismiss_suggestion("s1");
        let once = wf.state().clone();
        wf.dismiss_suggestion("s1");
        assert_eq!(wf.state(), &once);

        assert_eq!(wf.applied_suggestions().len(), 1);
        assert!(wf.additional_answers().is_empty());
        assert_eq!(wf.pending_suggestions().len(), 2);
    }

    #[test]
    fn test_all_answers_is_concatenation() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());
        wf.apply_suggestion(&suggestion("s3", SuggestionKind::AdditionalQuestion), Some("B"))
            .unwrap();
        wf.apply_suggestion(&suggestion("s1", SuggestionKind::AdditionalQuestion), Some("A"))
            .unwrap();
        wf.update_answer("q3", "Apendicectomia");

        let all = wf.all_answers();
        assert_eq!(all.len(), wf.edited_answers().len() + wf.additional_answers().len());
        let ids: Vec<&str> = all.iter().map(|qa| qa.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3", "additional-s3", "additional-s1"]);
    }

    #[test]
    fn test_complete_report() {
        let mut wf = WorkflowController::new();
        assert!(matches!(wf.complete_report(), Err(AnamneseError::NoReportSelected)));

        wf.select_report(report());
        wf.apply_suggestion(&suggestion("s1", SuggestionKind::AdditionalQuestion), Some("Sim"))
            .unwrap();
        wf.set_patient_signature(Some(signature()));

        let completed = wf.complete_report().unwrap();
        assert_eq!(completed.status, ReportStatus::Completed);
        assert_eq!(completed.answers.len(), 4);
        assert_eq!(completed.patient_signature, Some(signature()));
        assert!(completed.technician_signature.is_none());
        assert!(completed.completed_at.is_some());
        assert_eq!(wf.selected_report().unwrap().status, ReportStatus::Pending);
    }

    #[test]
    fn test_finish_requires_signatures_and_resets() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());
        wf.go_to_step(3).unwrap();
        wf.go_to_step(4).unwrap();

        let result = wf.finish(|_| Ok(()));
        assert!(matches!(result, Err(AnamneseError::Validation(_))));

        wf.set_patient_signature(Some(signature()));
        wf.set_technician_signature(Some(signature()));

        let failed = wf.finish(|_| Err::<(), _>(AnamneseError::Export("disk full".to_string())));
        assert!(matches!(failed, Err(AnamneseError::Export(_))));
        assert_eq!(wf.current_step(), Step::Sign);
        assert!(wf.can_complete());

        let (report, name) = wf.finish(|r| Ok(r.id.clone())).unwrap();
        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(name, "r1");
        assert_eq!(wf.state(), &WorkflowState::new());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut wf = WorkflowController::new();
        wf.select_report(report());
        wf.update_answer("q1", "Sim");
        wf.apply_suggestion(&suggestion("s1", SuggestionKind::AdditionalQuestion), Some("Sim"))
            .unwrap();
        wf.set_technician_signature(Some(signature()));
        wf.go_to_step(3).unwrap();

        wf.reset_workflow();
        assert_eq!(wf.state(), &WorkflowState::new());
        assert_eq!(wf.current_step(), Step::Search);
        assert_eq!(wf.steps()[0].status, StepStatus::Active);
    }
}
