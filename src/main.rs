use anyhow::Context;
use clap::Parser;
use photo_embed_common::matching::count_by_status;
use photo_embed_common::{apply_corrections, ExtractionRule, MatchResult, RunReport};
use photo_embed_rust::{cli, config, context, export, pipeline, review};
use cli::{Cli, Commands};
use config::Config;
use context::RunContext;
use pipeline::MatchSettings;
use std::path::{Path, PathBuf};

fn settings_for(config: &Config, rule: Option<ExtractionRule>, partial: bool) -> MatchSettings {
    let mut settings = MatchSettings::from_config(config);
    if let Some(rule) = rule {
        settings.rule = rule;
    }
    if partial {
        settings.options.partial_fallback = true;
    }
    settings
}

fn print_results(results: &[MatchResult]) {
    for r in results {
        let container = r
            .container
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("-");
        println!(
            "  行{:>4}  {:<20} {:<8} {}",
            r.row.row_index,
            r.row.tracking_raw,
            r.status.to_string(),
            container
        );
    }
}

fn print_report(report: &RunReport) {
    println!("  配置した画像: {}枚", report.images_placed);
    println!("  処理したコンテナ: {}", report.containers_processed);
    println!("  埋め込んだコンテナ: {}", report.containers_matched);
    if !report.skipped.is_empty() {
        println!("  スキップ: {}件", report.skipped.len());
        for s in &report.skipped {
            println!("    - [{}] {}: {}", s.kind, s.item, s.reason);
        }
    }
}

fn output_file(ctx: &RunContext, output: Option<&Path>, prefix: &str) -> PathBuf {
    let default = ctx.output_path(prefix);
    match output {
        Some(path) => {
            let file_name = default.file_name().unwrap_or_default().to_string_lossy();
            export::resolve_output_path(path, &file_name)
        }
        None => default,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug");
    }
    pretty_env_logger::init();

    let config = Config::load().context("設定の読み込みに失敗しました")?;

    match cli.command {
        Commands::Match { archives, document, rule, partial, output, report } => {
            println!("🔗 photo-embed - 照合\n");

            let settings = settings_for(&config, rule, partial);
            let ctx = RunContext::create(&config.work_base_dir())?;

            // 1. 読み込み
            println!("[1/3] 表ドキュメントとアーカイブを読み込み中... (ルール: {})", settings.rule);
            let run = pipeline::run_match(&ctx, &document, &archives, &settings)?;
            println!(
                "✔ {}行 / {}アーカイブ\n",
                run.document.rows.len(),
                run.containers.len()
            );

            // 2. 照合結果
            println!("[2/3] 照合結果");
            print_results(&run.results);
            let counts = count_by_status(&run.results);
            println!(
                "✔ 完全一致 {} / 部分一致 {} / 一致なし {}\n",
                counts.exact, counts.partial, counts.unmatched
            );

            // 3. 出力
            println!("[3/3] 出力中...");
            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&run.results)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("{} に書き込めません", path.display()))?;
                println!("✔ 照合結果JSON: {}", path.display());
            }
            if let Some(path) = report {
                export::write_match_report(&run.results, &run.containers, &path)?;
                println!("✔ 一覧表: {}", path.display());
            }
            print_report(&run.report);

            ctx.finish()?;
            println!("\n✅ 照合完了");
        }

        Commands::Embed { archives, document, corrections, interactive, rule, partial, output } => {
            println!("🖼  photo-embed - 画像埋め込み\n");

            let settings = settings_for(&config, rule, partial);
            let ctx = RunContext::create(&config.work_base_dir())?;

            // 1. 読み込み
            println!("[1/4] 表ドキュメントとアーカイブを読み込み中... (ルール: {})", settings.rule);
            let run = pipeline::run_match(&ctx, &document, &archives, &settings)?;
            println!(
                "✔ {}行 / {}アーカイブ\n",
                run.document.rows.len(),
                run.containers.len()
            );

            // 2. 照合と補正
            println!("[2/4] 照合中...");
            let mut results = run.results.clone();
            if let Some(path) = corrections {
                let list = pipeline::load_corrections(&path)?;
                results = apply_corrections(&results, &list, &run.containers)?;
                println!("- 補正ファイルを適用: {}件", list.len());
            }
            if interactive {
                let list = review::run_interactive_review(&results, &run.containers)?;
                results = apply_corrections(&results, &list, &run.containers)?;
                println!("- 対話補正を適用: {}件", list.len());
            }
            let counts = count_by_status(&results);
            println!(
                "✔ 完全一致 {} / 部分一致 {} / 手動 {} / 一致なし {}\n",
                counts.exact, counts.partial, counts.manual, counts.unmatched
            );

            // 3. 埋め込み
            println!("[3/4] 画像を埋め込み中...");
            let output_path = output_file(&ctx, output.as_deref(), "result");
            let mut report = run.report.clone();
            pipeline::embed_matches(
                &document,
                &output_path,
                &results,
                &run.containers,
                &mut report,
                !cli.verbose,
            )?;
            println!("✔ 出力: {}\n", output_path.display());

            // 4. 集計
            println!("[4/4] 集計");
            print_report(&report);

            ctx.finish()?;
            println!("\n✅ 完了");
        }

        Commands::Folder { inputs, output } => {
            println!("📁 photo-embed - フォルダ一覧\n");

            let ctx = RunContext::create(&config.work_base_dir())?;

            println!("[1/2] フォルダを読み込み、画像を配置中...");
            let output_path = output_file(&ctx, output.as_deref(), "folders");
            let report = pipeline::run_folder_export(&ctx, &inputs, &output_path, !cli.verbose)?;
            println!("✔ 出力: {}\n", output_path.display());

            println!("[2/2] 集計");
            print_report(&report);

            ctx.finish()?;
            println!("\n✅ 完了");
        }

        Commands::Config { show, init } => {
            if init {
                config.save()?;
                println!("✔ 設定ファイルを作成しました: {}", Config::config_path()?.display());
            }

            if show || !init {
                println!("設定: {}", Config::config_path()?.display());
                println!("  顧客キーワード: {}", config.customer_keywords.join(", "));
                println!("  追跡番号キーワード: {}", config.tracking_keywords.join(", "));
                println!("  RFIDキーワード: {}", config.rfid_keywords.join(", "));
                println!("  作業フォルダ: {}", config.work_base_dir().display());
                println!("  抽出ルール: {}", config.extraction_rule);
                println!("  部分一致: {}", if config.partial_fallback { "有効" } else { "無効" });
            }
        }
    }

    Ok(())
}
