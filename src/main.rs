use anyhow::{Context, Result};
use qctrend::error::PipelineError;
use qctrend::table::{
    parse_date_token, NormalizedTable, FAIL, FALSE_DEFECT, PASS, TOTAL_TESTS, TRUE_DEFECT,
};
use qctrend::{decode, ingest, store, trend};
use std::{env, fs, path::PathBuf, process::exit};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// How much of the raw upload to echo back when it cannot be reshaped.
const RAW_PREVIEW_LINES: usize = 10;

struct Options {
    file: PathBuf,
    category: Option<String>,
    date: Option<String>,
    json: bool,
    db: Option<PathBuf>,
    table_name: String,
}

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {program} <CSV_FILE> [--category LABEL] [--date YYMMDD] [--json] \
         [--db PATH] [--table NAME]"
    );
    exit(1);
}

fn take_value(argv: &[String], i: &mut usize, program: &str) -> String {
    *i += 1;
    match argv.get(*i) {
        Some(value) => value.clone(),
        None => usage(program),
    }
}

fn parse_args() -> Options {
    let argv: Vec<String> = env::args().collect();
    let program = argv
        .first()
        .map(String::as_str)
        .unwrap_or("qctrend")
        .to_string();

    let mut file = None;
    let mut category = None;
    let mut date = None;
    let mut json = false;
    let mut db = None;
    let mut table_name = "historyinspection".to_string();

    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--category" => category = Some(take_value(&argv, &mut i, &program)),
            "--date" => date = Some(take_value(&argv, &mut i, &program)),
            "--json" => json = true,
            "--db" => db = Some(PathBuf::from(take_value(&argv, &mut i, &program))),
            "--table" => table_name = take_value(&argv, &mut i, &program),
            flag if flag.starts_with("--") => usage(&program),
            positional => {
                if file.is_some() {
                    usage(&program);
                }
                file = Some(PathBuf::from(positional));
            }
        }
        i += 1;
    }

    let Some(file) = file else { usage(&program) };
    Options {
        file,
        category,
        date,
        json,
        db,
        table_name,
    }
}

fn main() {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let opts = parse_args();
    if let Err(err) = run(&opts) {
        eprintln!("Error: {err:#}");
        exit(1);
    }
}

fn run(opts: &Options) -> Result<()> {
    // ─── 2) read + decode the upload ─────────────────────────────────
    let bytes =
        fs::read(&opts.file).with_context(|| format!("reading {}", opts.file.display()))?;
    let text = decode::decode_payload(&bytes)?;

    // ─── 3) reshape into the normalized table ────────────────────────
    let ingested = match ingest::parse_text(&text) {
        Ok(ingested) => ingested,
        Err(err @ (PipelineError::MissingKeyColumn { .. } | PipelineError::NoValidData { .. })) => {
            // Echo the unreshaped upload so the user can see what the
            // parser saw.
            eprintln!("Error: {err}");
            eprintln!("--- raw upload (first {RAW_PREVIEW_LINES} lines) ---");
            for line in text.lines().take(RAW_PREVIEW_LINES) {
                eprintln!("{line}");
            }
            exit(1);
        }
        Err(err) => return Err(err.into()),
    };
    for skipped in &ingested.skipped {
        warn!(block = skipped.index, label = ?skipped.label, error = %skipped.error, "block skipped");
    }
    let table = &ingested.table;

    // ─── 4) resolve the selection ────────────────────────────────────
    let categories = table.categories();
    let category = match &opts.category {
        Some(category) => category.as_str(),
        None => *categories.first().context("table has no categories")?,
    };
    let summary = trend::day_summary(table, category, opts.date.as_deref())?;
    let breakdown = trend::day_breakdown(table, category, Some(&summary.date))?;

    // ─── 5) render ───────────────────────────────────────────────────
    if opts.json {
        let trend_series = trend::defect_trend(table, category)?;
        let doc = serde_json::json!({
            "categories": categories,
            "dates": table.dates(category),
            "summary": summary,
            "trend": trend_series,
            "breakdown": breakdown,
            "rows": &table.rows,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        render_report(table, &categories, &summary, &breakdown);
    }

    // ─── 6) optional pass-through store ──────────────────────────────
    if let Some(db_path) = &opts.db {
        let mut conn = store::open_db(db_path)?;
        let rows = store::save_table(&mut conn, &opts.table_name, table)?;
        info!(rows, db = %db_path.display(), table = %opts.table_name, "upload stored");
        println!(
            "{} row(s) saved to table `{}` in {}",
            rows,
            opts.table_name,
            db_path.display()
        );
    }

    Ok(())
}

fn render_report(
    table: &NormalizedTable,
    categories: &[&str],
    summary: &trend::DaySummary,
    breakdown: &[trend::BreakdownSlice],
) {
    let pretty_date = parse_date_token(&summary.date)
        .map(|d| format!(" ({})", d.format("%Y-%m-%d")))
        .unwrap_or_default();

    println!("구분: {}  (uploaded: {})", summary.category, categories.join(", "));
    println!("날짜: {}{pretty_date}", summary.date);
    println!();
    println!("  {:<12} {:>10}", TOTAL_TESTS, fmt_count(summary.total_tests));
    println!("  {:<12} {:>10}", PASS, fmt_count(summary.pass));
    println!("  {:<12} {:>10}", FAIL, fmt_count(summary.fail));
    println!(
        "  {:<12} {:>10}   Δ {}",
        FALSE_DEFECT,
        fmt_count(summary.false_defect),
        fmt_delta(summary.delta_false_defect)
    );
    println!(
        "  {:<12} {:>10}   Δ {}",
        TRUE_DEFECT,
        fmt_count(summary.true_defect),
        fmt_delta(summary.delta_true_defect)
    );

    println!();
    println!("일자별 불량 추이 ({}):", summary.category);
    println!(
        "  {:<8} {:>10} {:>10} {:>10}",
        "날짜", FALSE_DEFECT, TRUE_DEFECT, FAIL
    );
    for date in table.dates(&summary.category) {
        let row = table.row(&summary.category, date);
        println!(
            "  {:<8} {:>10} {:>10} {:>10}",
            date,
            fmt_count(row.and_then(|r| r.false_defect)),
            fmt_count(row.and_then(|r| r.true_defect)),
            fmt_count(row.and_then(|r| r.fail)),
        );
    }

    println!();
    println!("선택한 날짜의 불량 유형별 비율:");
    for slice in breakdown {
        println!("  {:<12} {:>10}", slice.metric, fmt_count(slice.value));
    }
}

fn fmt_count(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => group_thousands(v as i64),
        Some(v) => v.to_string(),
        None => "N/A".to_string(),
    }
}

fn fmt_delta(value: Option<f64>) -> String {
    match value {
        Some(d) => format!("{d:+}"),
        None => "N/A".to_string(),
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{out}")
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_group_thousands() {
        assert_eq!(fmt_count(Some(5798.0)), "5,798");
        assert_eq!(fmt_count(Some(213.0)), "213");
        assert_eq!(fmt_count(Some(1234567.0)), "1,234,567");
        assert_eq!(fmt_count(Some(-1000.0)), "-1,000");
        assert_eq!(fmt_count(None), "N/A");
    }

    #[test]
    fn deltas_carry_their_sign() {
        assert_eq!(fmt_delta(Some(29.0)), "+29");
        assert_eq!(fmt_delta(Some(-43.0)), "-43");
        assert_eq!(fmt_delta(None), "N/A");
    }
}
