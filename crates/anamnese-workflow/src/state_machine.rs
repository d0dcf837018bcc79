//! 步骤状态机
//!
//! 管理四个固定步骤（查询、编辑、复核、签名）的当前位置与各步骤状态

use anamnese_core::{AnamneseError, Result, StepStatus, WorkflowStep};
use serde::{Deserialize, Serialize};

/// 工作流步骤
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Search = 1,
    Edit = 2,
    Review = 3,
    Sign = 4,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Search, Step::Edit, Step::Review, Step::Sign];

    pub fn from_id(id: i64) -> Option<Step> {
        match id {
            1 => Some(Step::Search),
            2 => Some(Step::Edit),
            3 => Some(Step::Review),
            4 => Some(Step::Sign),
            _ => None,
        }
    }

    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Search => "Busca",
            Step::Edit => "Edição",
            Step::Review => "Revisão",
            Step::Sign => "Assinatura",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Step::Search => "Localizar relatório",
            Step::Edit => "Revisar e corrigir",
            Step::Review => "Confirmar dados",
            Step::Sign => "Finalizar documento",
        }
    }
}

/// 返回前面步骤时对后续步骤状态的处理策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackNavigation {
    /// 后续已完成步骤保持 `complete`
    #[default]
    KeepComplete,
    /// 目标之后的所有步骤回退为 `pending`
    RevertDownstream,
}

/// 步骤状态机
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStateMachine {
    current: Step,
    steps: Vec<WorkflowStep>,
}

impl StepStateMachine {
    /// 创建初始状态：第一步激活，其余待处理
    pub fn new() -> Self {
        let steps = Step::ALL
            .iter()
            .map(|step| WorkflowStep {
                id: step.id(),
                title: step.title().to_string(),
                description: step.description().to_string(),
                status: if *step == Step::Search {
                    StepStatus::Active
                } else {
                    StepStatus::Pending
                },
            })
            .collect();

        Self {
            current: Step::Search,
            steps,
        }
    }

    pub fn current(&self) -> Step {
        self.current
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn status_of(&self, step: Step) -> StepStatus {
        self.steps[step.id() as usize - 1].status
    }

    /// 检查步骤跳转是否有效
    pub fn can_transition(&self, target: i64) -> bool {
        Step::from_id(target).is_some()
    }

    /// 执行步骤跳转，无效目标时状态保持不变
    pub fn transition(&mut self, target: i64, back: BackNavigation) -> Result<Step> {
        let Some(to) = Step::from_id(target) else {
            return Err(AnamneseError::InvalidStepTransition {
                from: self.current.id(),
                to: target,
            });
        };
        let from = self.current;

        if to > from {
            self.set_status(from, StepStatus::Complete);
        } else if to < from {
            // 离开的步骤尚未完成，不能保持激活
            if self.status_of(from) == StepStatus::Active {
                self.set_status(from, StepStatus::Pending);
            }
            if back == BackNavigation::RevertDownstream {
                for step in Step::ALL.iter().filter(|s| **s > to) {
                    self.set_status(*step, StepStatus::Pending);
                }
            }
        }

        self.set_status(to, StepStatus::Active);
        self.current = to;

        tracing::debug!("Step transitioned from {:?} to {:?}", from, to);
        Ok(to)
    }

    fn set_status(&mut self, step: Step, status: StepStatus) {
        if let Some(entry) = self.steps.iter_mut().find(|s| s.id == step.id()) {
            entry.status = status;
        }
    }
}

impl Default for StepStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
