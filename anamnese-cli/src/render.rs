//! 终端输出

use anamnese_workflow::views::{
    stepper, CategorySection, SuggestionCard, EDIT_PLACEHOLDER, PATIENT_SIGNATURE_LABEL,
    REVIEW_PLACEHOLDER, TECHNICIAN_SIGNATURE_LABEL,
};
use anamnese_workflow::{
    CategoryGroup, PatientSummary, ReportCard, ReviewView, SignView, WorkflowController,
};
use anamnese_core::{QuestionAnswer, StepStatus};

fn print_answer(answer: &QuestionAnswer, placeholder: &str) {
    let text = if answer.answer.trim().is_empty() {
        placeholder
    } else {
        answer.answer.as_str()
    };
    println!("   {}", answer.question);
    println!("     R: {}", text);
}

pub fn print_stepper(controller: &WorkflowController) {
    let line: Vec<String> = stepper(controller)
        .into_iter()
        .map(|item| {
            let marker = match item.status {
                StepStatus::Complete => "✓",
                StepStatus::Active => "●",
                StepStatus::Pending => "○",
            };
            format!("{} {}. {}", marker, item.id, item.title)
        })
        .collect();
    println!("{}", line.join("  ─  "));
}

pub fn print_cards(cards: &[ReportCard]) {
    for card in cards {
        println!("📄 [{}] {} · {}", card.report_id, card.patient_name, card.exam_label);
        println!("     CPF: {}  |  {}  |  {}", card.cpf, card.created_label, card.status_label);
        if let Some(note) = &card.suggestion_note {
            println!("     🤖 {}", note);
        }
    }
}

pub fn print_patient(patient: &PatientSummary) {
    println!("👤 {} ({})", patient.name, patient.exam_label);
    println!(
        "   CPF: {}  |  Nascimento: {}  |  Telefone: {}",
        patient.cpf, patient.birth_date, patient.phone
    );
    if let Some(responsible) = &patient.responsible {
        println!(
            "   Responsável: {} ({}) CPF {}",
            responsible.name, responsible.relationship, responsible.cpf
        );
    }
}

pub fn print_sections(sections: &[CategorySection]) {
    for section in sections {
        let arrow = if section.expanded { "▾" } else { "▸" };
        println!("{} {} ({})", arrow, section.name, section.count_label());
        if !section.expanded {
            continue;
        }
        for answer in &section.answers {
            print_answer(answer, EDIT_PLACEHOLDER);
        }
    }
}

pub fn print_suggestions(cards: &[SuggestionCard]) {
    for card in cards {
        println!(
            "💡 [{}] {} ({:?}) {}",
            card.id, card.kind_label, card.priority, card.text
        );
        println!("     {}", card.reason);
    }
}

pub fn print_groups(groups: &[CategoryGroup]) {
    for group in groups {
        println!("■ {}", group.name);
        for answer in &group.answers {
            print_answer(answer, REVIEW_PLACEHOLDER);
        }
    }
}

pub fn print_review(review: &ReviewView) {
    print_patient(&review.patient);
    print_groups(&review.groups);
}

pub fn print_sign_status(view: &SignView) {
    let mark = |captured: bool| if captured { "✅" } else { "❌" };
    println!(
        "{} {}  {} {}",
        mark(view.patient_captured),
        PATIENT_SIGNATURE_LABEL,
        mark(view.technician_captured),
        TECHNICIAN_SIGNATURE_LABEL
    );
    if let Some(message) = view.status_message() {
        println!("   {} ({} respostas)", message, view.answer_count);
    }
}
