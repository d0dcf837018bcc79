//! 问卷审核命令行程序

mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anamnese_admin::{init_logging, AppConfig, ConfigValidator};
use anamnese_core::fixtures::{load_reports_from_file, sample_reports};
use anamnese_core::{Report, Signature};
use anamnese_export::{render_strokes, signature_from_png_bytes, DocumentExporter, PadSettings};
use anamnese_workflow::{
    EditView, InMemoryReportRepository, ReportLookup, ReviewView, SearchView, SignView,
    WorkflowController,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// 问卷审核命令行参数
#[derive(Parser, Debug)]
#[command(name = "anamnese")]
#[command(about = "Revisão de anamnese: busca, edição, revisão, assinatura e exportação em PDF")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 按 CPF 查询报告
    Search {
        /// 患者 CPF，可带或不带格式
        cpf: String,
    },
    /// 执行完整审核流程并导出 PDF
    Complete {
        cpf: String,

        /// 要审核的报告ID，查询结果只有一条时可省略
        #[arg(long)]
        report: Option<String>,

        /// 修改回答，格式 `问题ID=回答`
        #[arg(long = "answer", value_parser = parse_answer_edit)]
        answers: Vec<(String, String)>,

        /// 采纳建议，附加问题需要 `建议ID=回答`
        #[arg(long = "accept", value_parser = parse_accept)]
        accept: Vec<(String, Option<String>)>,

        /// 忽略建议
        #[arg(long = "dismiss")]
        dismiss: Vec<String>,

        /// 患者签名文件（PNG 或 JSON 笔画）
        #[arg(long)]
        patient_signature: PathBuf,

        /// 技术员签名文件（PNG 或 JSON 笔画）
        #[arg(long)]
        technician_signature: PathBuf,

        /// 输出目录，覆盖配置
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// 打印生效配置
    Config,
}

fn parse_answer_edit(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((id, answer)) if !id.trim().is_empty() => {
            Ok((id.trim().to_string(), answer.to_string()))
        }
        _ => Err(format!("expected QUESTION_ID=ANSWER, got `{}`", value)),
    }
}

fn parse_accept(value: &str) -> std::result::Result<(String, Option<String>), String> {
    let (id, answer) = match value.split_once('=') {
        Some((id, answer)) => (id, Some(answer.to_string())),
        None => (value, None),
    };
    if id.trim().is_empty() {
        return Err(format!("missing suggestion id in `{}`", value));
    }
    Ok((id.trim().to_string(), answer))
}

/// 读取签名文件：PNG 原样编码，其他内容按 `[[[x,y],...],...]` 笔画绘制
fn load_signature(path: &Path, pad: &PadSettings) -> Result<Signature> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read signature file {}", path.display()))?;

    if bytes.starts_with(PNG_MAGIC) {
        return Ok(signature_from_png_bytes(&bytes)?);
    }

    let strokes: Vec<Vec<[f32; 2]>> = serde_json::from_slice(&bytes).with_context(|| {
        format!(
            "{} is neither a PNG image nor a JSON stroke list",
            path.display()
        )
    })?;
    let strokes: Vec<Vec<(f32, f32)>> = strokes
        .into_iter()
        .map(|stroke| stroke.into_iter().map(|[x, y]| (x, y)).collect())
        .collect();

    Ok(render_strokes(pad, &strokes)?)
}

fn build_lookup(config: &AppConfig) -> Result<ReportLookup> {
    let reports: Vec<Report> = match &config.lookup.fixtures_path {
        Some(path) => load_reports_from_file(path)
            .with_context(|| format!("Failed to load reports from {}", path))?,
        None => sample_reports()?,
    };
    info!("已加载 {} 份报告", reports.len());

    let repository = InMemoryReportRepository::new(reports).with_latency(config.lookup.latency());
    Ok(ReportLookup::new(Arc::new(repository), config.lookup.settings()))
}

async fn run_search(lookup: &ReportLookup, cpf: &str) -> Result<SearchView> {
    let mut view = SearchView::new();
    view.set_input(cpf);

    if !view.search(lookup).await {
        bail!(
            "CPF `{}` must contain at least {} digits",
            view.input(),
            lookup.settings().min_digits
        );
    }
    if let Some(error) = view.last_error() {
        bail!("Lookup failed: {}", error);
    }
    Ok(view)
}

fn pick_report(view: &SearchView, requested: Option<&str>) -> Result<String> {
    if let Some(id) = requested {
        return Ok(id.to_string());
    }
    match view.results() {
        [only] => Ok(only.id.clone()),
        [] => Err(anyhow!("No report found for CPF {}", view.input())),
        many => Err(anyhow!(
            "{} reports match CPF {}; choose one with --report ({})",
            many.len(),
            view.input(),
            many.iter().map(|r| r.id.as_str()).collect::<Vec<_>>().join(", ")
        )),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_complete(
    config: &AppConfig,
    cpf: &str,
    report: Option<&str>,
    answers: &[(String, String)],
    accept: &[(String, Option<String>)],
    dismiss: &[String],
    patient_signature: &Path,
    technician_signature: &Path,
    output_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    let lookup = build_lookup(config)?;
    let mut controller = WorkflowController::with_back_navigation(config.workflow.back_navigation());

    // 步骤 1: 查询
    let search = run_search(&lookup, cpf).await?;
    let report_id = pick_report(&search, report)?;
    search.select(&report_id, &mut controller)?;
    render::print_stepper(&controller);

    // 步骤 2: 编辑
    let mut edit = EditView::new();
    for (question_id, answer) in answers {
        edit.start_editing(question_id);
        if !edit.commit_edit(&mut controller, answer) {
            bail!("Question {} does not exist in report {}", question_id, report_id);
        }
    }
    for (suggestion_id, answer) in accept {
        if let Some(answer) = answer {
            edit.set_draft(suggestion_id, answer);
        }
        edit.apply(&mut controller, suggestion_id)?;
    }
    for suggestion_id in dismiss {
        edit.dismiss(&mut controller, suggestion_id);
    }

    if let Some(patient) = edit.patient(&controller) {
        render::print_patient(&patient);
    }
    render::print_sections(&edit.sections(&controller));
    if let Some(badge) = edit.pending_badge(&controller) {
        warn!("{} sugestão(ões) sem decisão: {}", controller.pending_suggestions().len(), badge);
        render::print_suggestions(&edit.suggestion_cards(&controller));
    }
    edit.continue_to_review(&mut controller)?;
    render::print_stepper(&controller);

    // 步骤 3: 复核
    render::print_review(&ReviewView::build(&controller)?);
    ReviewView::continue_to_signature(&mut controller)?;
    render::print_stepper(&controller);

    // 步骤 4: 签名与导出
    let pad = config.signature.pad_settings();
    controller.set_patient_signature(Some(load_signature(patient_signature, &pad)?));
    controller.set_technician_signature(Some(load_signature(technician_signature, &pad)?));
    render::print_sign_status(&SignView::build(&controller));

    let exporter = DocumentExporter::new(config.export.layout(), config.export.file_prefix.clone());
    let dir = output_dir.unwrap_or_else(|| PathBuf::from(&config.export.output_dir));
    let (completed, path) = controller.finish(|report| exporter.export_to_dir(report, &dir))?;

    info!("报告 {} 已完成，导出到 {}", completed.id, path.display());
    Ok(path)
}

/// 加载配置并套用命令行覆盖，覆盖后重新验证
fn effective_config(path: Option<&str>, log_level: Option<&str>) -> Result<AppConfig> {
    let mut config = AppConfig::load(path)?;
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
        ConfigValidator::new()
            .validate(&config)
            .context("Invalid --log-level")?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = effective_config(args.config.as_deref(), args.log_level.as_deref())?;
    init_logging(&config.logging)?;

    match args.command {
        Command::Search { cpf } => {
            let lookup = build_lookup(&config)?;
            let view = run_search(&lookup, &cpf).await?;
            if let Some(summary) = view.summary() {
                println!("{}", summary);
            }
            render::print_cards(&view.cards());
        }
        Command::Complete {
            cpf,
            report,
            answers,
            accept,
            dismiss,
            patient_signature,
            technician_signature,
            output_dir,
        } => {
            let path = run_complete(
                &config,
                &cpf,
                report.as_deref(),
                &answers,
                &accept,
                &dismiss,
                &patient_signature,
                &technician_signature,
                output_dir,
            )
            .await?;
            println!("✅ PDF gerado: {}", path.display());
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
