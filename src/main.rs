use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use roster_analyzer::batch;
use roster_analyzer::{
    group_averages, CombinedDataset, CombinedStudent, Config, SubjectClassifier,
    SubjectGroupConfig,
};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_analyzer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = Command::new("roster-analyzer")
        .version("0.1")
        .about("Reconciles class roster achievement sheets and derives grade statistics")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("data")
                .short('d')
                .long("data")
                .value_name("DIR")
                .help("Directory with sheet exports (overrides data_directory)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the combined dataset as JSON"),
        )
        .arg(
            Arg::new("student")
                .short('s')
                .long("student")
                .value_name("NUMBER")
                .value_parser(clap::value_parser!(u32))
                .help("Show details for one student by combined number"),
        )
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");
    let as_json = matches.get_flag("json");

    let config = if Path::new(config_file).exists() {
        if !as_json {
            println!("📋 Loading configuration from: {}", config_file);
        }
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load configuration: {}", config_file))?
    } else {
        let default_config = Config::default();
        default_config
            .save_to_file(config_file)
            .with_context(|| format!("Failed to write default configuration: {}", config_file))?;
        if !as_json {
            println!("📝 Created default configuration file: {}", config_file);
        }
        default_config
    };

    let data_dir = matches
        .get_one::<String>("data")
        .cloned()
        .or_else(|| config.data_directory.clone())
        .unwrap_or_else(|| "data-source".to_string());
    let extension = config.file_extension.as_deref().unwrap_or("csv");

    let groups = SubjectGroupConfig::load_or_default(config.subject_groups_file.as_deref());
    let classifier = SubjectClassifier::new(groups);

    let paths = batch::collect_sheet_files(Path::new(&data_dir), extension)
        .with_context(|| format!("Failed to read data directory: {}", data_dir))?;
    if paths.is_empty() {
        eprintln!("❌ No .{} files found in {}", extension, data_dir);
        return Ok(());
    }
    if !as_json {
        println!("📂 Reading {} sheet exports from: {}", paths.len(), data_dir);
    }

    let dataset = batch::build_dataset(paths, config.on_unreadable)
        .await
        .context("Failed to build combined dataset")?;

    if dataset.is_empty() && !as_json {
        println!("⚠️  No subjects or students found in the sheet exports");
        return Ok(());
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&dataset)?);
        return Ok(());
    }

    if let Some(number) = matches.get_one::<u32>("student") {
        match dataset.student(*number) {
            Some(student) => print_student(&dataset, student, &classifier),
            None => println!("❓ No student with number {}", number),
        }
        return Ok(());
    }

    print_summary(&dataset);
    println!("\n✅ Analysis complete!");
    Ok(())
}

fn format_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn print_summary(dataset: &CombinedDataset) {
    println!("\n📊 SUMMARY");
    println!("==========\n");
    println!("Files: {}", dataset.file_names().join(", "));

    println!("\n📚 Subjects:");
    for subject in dataset.subjects() {
        let dist = subject
            .distribution
            .iter()
            .map(|(letter, pct)| format!("{}({:.1})", letter, pct))
            .collect::<String>();
        println!(
            "   {}({}) - average {:.1} {}",
            subject.name, subject.credits, subject.average, dist
        );
    }

    println!("\n🎓 Students:");
    for student in dataset.students() {
        let rank = match (student.average_grade_rank, student.total_graded_students) {
            (Some(rank), Some(total)) => {
                let tie = student
                    .same_grade_count
                    .filter(|n| *n > 1)
                    .map(|n| format!(" ({} tied)", n))
                    .unwrap_or_default();
                format!("{}/{}{}", rank, total, tie)
            }
            _ => "-".to_string(),
        };
        println!(
            "   {:>3}. {} - grade {} / 9-band {} - rank {}",
            student.number,
            student.display_name,
            format_opt(student.weighted_average_grade),
            format_opt(student.weighted_average_9grade),
            rank
        );
    }
}

fn print_student(dataset: &CombinedDataset, student: &CombinedStudent, classifier: &SubjectClassifier) {
    println!("\n🎓 {} (#{})", student.display_name, student.number);
    println!("Files: {}", student.file_names.join(", "));
    println!(
        "Average grade: {} / 9-band: {}",
        format_opt(student.weighted_average_grade),
        format_opt(student.weighted_average_9grade)
    );

    println!("\n📚 Subjects:");
    for subject in dataset.subjects() {
        if student.subject_credits.get(&subject.name) != Some(&subject.credits) {
            continue;
        }
        let show = |v: Option<&u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "   [{}] {}({}): score {} / {} / grade {} / rank {} of {} / percentile {}",
            classifier.classify(&subject.name),
            subject.name,
            subject.credits,
            show(student.scores.get(&subject.name)),
            student
                .achievements
                .get(&subject.name)
                .map(String::as_str)
                .unwrap_or("-"),
            show(student.grades.get(&subject.name)),
            show(student.ranks.get(&subject.name)),
            show(student.subject_totals.get(&subject.name)),
            show(student.percentiles.get(&subject.name)),
        );
    }

    println!("\n🧩 Groups:");
    for group in group_averages(student, classifier) {
        println!(
            "   {} ({} subjects): grade {} / 9-band {}",
            group.group,
            group.subject_count,
            format_opt(group.weighted_average_grade),
            format_opt(group.weighted_average_9grade)
        );
    }
}
