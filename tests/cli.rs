use clap::Parser;
use ferry_ridership::cli::{run, Cli};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn monthly_total(month_index: usize) -> u64 {
    let season = (2.0 * std::f64::consts::PI * (month_index % 12) as f64 / 12.0).sin();
    let jitter = ((month_index * 37) % 11) as f64 * 20.0;
    (20_000.0 + 8_000.0 * season + jitter) as u64
}

fn write_year(dir: &Path, year: i32, first_month_index: usize) -> PathBuf {
    let mut body = String::from("PÄIVÄMÄÄRÄ,SUUNTA,NOUSIJAT\n");
    for month in 1..=12 {
        let total = monthly_total(first_month_index + month - 1);
        writeln!(body, "{}-{:02}-05 07:00:00,s1,{}", year, month, total / 3).unwrap();
        writeln!(body, "{}-{:02}-20 18:00:00,s2,{}", year, month, total - total / 3).unwrap();
        writeln!(body, "{}-{:02}-20 19:00:00,K2,5000", year, month).unwrap();
    }
    let path = dir.join(format!("{}.csv", year));
    fs::write(&path, body).unwrap();
    path
}

fn years(count: usize) -> (TempDir, Vec<PathBuf>) {
    let dir = tempdir().unwrap();
    let paths = (0..count)
        .map(|i| write_year(dir.path(), 2020 + i as i32, i * 12))
        .collect();
    (dir, paths)
}

fn run_args(args: Vec<String>) -> anyhow::Result<Value> {
    let cli = Cli::try_parse_from(args)?;
    Ok(serde_json::from_str(&run(cli)?)?)
}

fn args(parts: &[&str], files: &[PathBuf]) -> Vec<String> {
    let mut out: Vec<String> = std::iter::once("ferry-ridership")
        .chain(parts.iter().copied())
        .map(String::from)
        .collect();
    out.extend(files.iter().map(|p| p.display().to_string()));
    out
}

#[test]
fn test_stationarity_command() {
    let (_dir, paths) = years(3);
    let report = run_args(args(&["stationarity", "--data"], &paths)).unwrap();

    assert!(report["original"]["p_value"].as_f64().is_some());
    assert_eq!(report["original"]["significance"], 0.05);
    assert!(report["differenced"].is_object());
}

#[test]
fn test_forecast_command_writes_csv() {
    let (dir, paths) = years(4);
    let output = dir.path().join("forecast.csv");

    let mut argv = args(
        &[
            "forecast",
            "--order",
            "0,0,0",
            "--seasonal",
            "0,1,0,12",
            "--method",
            "nelder-mead",
            "--horizon",
            "3",
            "--output",
        ],
        &[output.clone()],
    );
    argv.push("--actual".to_string());
    argv.push(paths[3].display().to_string());
    argv.push("--data".to_string());
    argv.extend(paths[..3].iter().map(|p| p.display().to_string()));

    let report = run_args(argv).unwrap();
    assert_eq!(report["candidate"]["method"], "nelder_mead");
    assert_eq!(report["forecast"].as_array().unwrap().len(), 3);
    assert_eq!(report["forecast"][0]["period"], "2023-01-01");
    assert_eq!(report["score"]["points"], 3);
    assert_eq!(report["training_len"], 36);

    let csv = fs::read_to_string(output).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "period,forecast");
    assert!(lines[1].starts_with("2023-01-01,"));
}

#[test]
fn test_search_command_with_config() {
    let (dir, paths) = years(4);
    let config = dir.path().join("config.json");
    fs::write(
        &config,
        r#"{
            "space": {
                "p": { "min": 0, "max": 0 },
                "d": { "min": 0, "max": 0 },
                "q": { "min": 0, "max": 1 },
                "seasonal_p": { "min": 0, "max": 0 },
                "seasonal_d": { "min": 0, "max": 1 },
                "seasonal_q": { "min": 0, "max": 0 },
                "methods": ["nelder_mead"]
            }
        }"#,
    )
    .unwrap();

    let mut argv = args(&["search", "--config"], &[config]);
    argv.push("--train".to_string());
    argv.extend(paths[..3].iter().map(|p| p.display().to_string()));
    argv.push("--actual".to_string());
    argv.push(paths[3].display().to_string());

    let run = run_args(argv).unwrap();
    assert_eq!(run["search"]["total"], 4);
    assert_eq!(run["search"]["attempted"], 4);
    assert_eq!(run["search"]["best"]["candidate"]["seasonal"]["d"], 1);
    assert_eq!(run["forecast"]["training_len"], 48);
    assert_eq!(run["forecast"]["forecast"][0]["period"], "2024-01-01");
}

#[test]
fn test_aic_search_runs_without_actuals() {
    let (dir, paths) = years(3);
    let config = dir.path().join("config.json");
    fs::write(
        &config,
        r#"{
            "space": {
                "p": { "min": 0, "max": 1 },
                "d": { "min": 0, "max": 0 },
                "q": { "min": 0, "max": 0 },
                "seasonal_p": { "min": 0, "max": 0 },
                "seasonal_d": { "min": 1, "max": 1 },
                "seasonal_q": { "min": 0, "max": 0 },
                "methods": ["nelder_mead"]
            },
            "search": { "criterion": "aic" }
        }"#,
    )
    .unwrap();

    let mut argv = args(&["search", "--config"], &[config]);
    argv.push("--train".to_string());
    argv.extend(paths.iter().map(|p| p.display().to_string()));

    let run = run_args(argv).unwrap();
    assert_eq!(run["search"]["criterion"], "aic");
    assert_eq!(run["search"]["attempted"], 2);
    assert!(run["search"]["best"]["score"].is_null());
    assert_eq!(run["forecast"]["training_len"], 36);
    assert_eq!(run["forecast"]["forecast"][0]["period"], "2023-01-01");

    let plain = args(&["search", "--train"], &paths);
    let err = run_args(plain).unwrap_err();
    assert!(format!("{:#}", err).contains("--actual is required"));
}

#[test]
fn test_bad_arguments_are_rejected() {
    let base = ["ferry-ridership", "forecast", "--data", "a.csv"];
    let with = |extra: &[&str]| {
        Cli::try_parse_from(base.iter().chain(extra.iter()).copied()).map(|_| ())
    };

    assert!(with(&["--order", "1,1,1"]).is_ok());
    assert!(with(&["--order", "1,2"]).is_err());
    assert!(with(&["--order", "1,1,1", "--method", "newton"]).is_err());
    assert!(with(&["--order", "1,1,1", "--seasonal", "1,1,1"]).is_err());
    assert!(with(&[]).is_err());
}

#[test]
fn test_unreadable_input_is_reported() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.csv");
    let err = run_args(args(&["stationarity", "--data"], &[missing])).unwrap_err();
    assert!(format!("{:#}", err).contains("history"));
}
