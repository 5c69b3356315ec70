use anyhow::{Context, Result};
use chrono::Utc;
use env_logger::Env;
use facility_lib::export::{
    write_csv, write_json, write_run_summary, ALL_FACILITIES_JSON, HOSPITALS_CSV, HOSPITALS_JSON,
    RUN_SUMMARY_JSON,
};
use facility_lib::geography::boundary_loader::{load_district_boundaries, NEPAL_DISTRICTS_GEOJSON_URL};
use facility_lib::geography::GeographyReference;
use facility_lib::models::stats_models::{PipelineStats, SourceStats};
use facility_lib::reconcile;
use facility_lib::sources::arcgis::collect_arcgis;
use facility_lib::sources::hdx::collect_hdx;
use facility_lib::sources::hip::collect_hip;
use facility_lib::sources::nssd::collect_nssd;
use facility_lib::sources::{run_with_timeout, SourceDiagnostic, SourceOutcome};
use facility_lib::utils::config::PipelineConfig;
use facility_lib::utils::env::load_env;
use facility_lib::utils::http::build_client;
use facility_lib::utils::progress_bars::progress_config::ProgressConfig;
use facility_lib::Source;
use indicatif::ProgressBar;
use log::{info, warn};
use std::future::Future;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Runs one source under its deadline, ticking its spinner, and reports how
/// long the fetch took.
async fn timed_source<T, F>(
    source: Source,
    limit: Duration,
    spinner: Option<ProgressBar>,
    fetch: F,
) -> (SourceOutcome<T>, f64)
where
    F: Future<Output = Result<Vec<T>>>,
{
    if let Some(pb) = &spinner {
        pb.set_message("fetching...");
    }
    let start = Instant::now();
    let outcome = run_with_timeout(source, limit, fetch).await;
    let elapsed = start.elapsed().as_secs_f64();
    if let Some(pb) = &spinner {
        let message = match &outcome {
            SourceOutcome::Collected(records) => format!("✓ {} records", records.len()),
            SourceOutcome::Failed { .. } => "✗ failed".to_string(),
        };
        pb.finish_with_message(message);
    }
    (outcome, elapsed)
}

fn source_stats(
    source: Source,
    records: usize,
    fetch_time: f64,
    diagnostics: &[SourceDiagnostic],
) -> SourceStats {
    let mut stats = SourceStats::new(source, records, fetch_time);
    if let Some(diagnostic) = diagnostics.iter().find(|d| d.source == source) {
        stats.failed = true;
        stats.failure_reason = Some(diagnostic.reason.clone());
    }
    stats
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging and environment
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    info!("Starting Nepal health facility aggregation");
    load_env();

    let config = PipelineConfig::from_env();
    config.log_config();

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );
    let multi_progress = progress_config.create_multi_progress();
    let main_pb = progress_config.phase_bar(multi_progress.as_ref(), 3);
    if let Some(pb) = &main_pb {
        pb.set_message("Phase 1: Fetching sources");
    }

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;

    let run_id = Uuid::new_v4().to_string();
    let run_timestamp = Utc::now().naive_utc();
    let mut stats = PipelineStats::new(
        &run_id,
        run_timestamp,
        Some("Aggregation of HIP, NSSD, ArcGIS and HDX/OSM facility lists"),
    );
    info!("Run ID: {}", run_id);
    let run_start = Instant::now();

    let geo = GeographyReference::new();
    let client = build_client(config.http_timeout(), true)?;
    let nssd_client = build_client(config.http_timeout(), config.nssd_verify_ssl)
        .context("Failed to build NSSD client")?;
    let raw_output_dir = config.hdx_save_raw.then_some(config.output_dir.as_path());

    // Phase 1: all four sources concurrently
    info!("Phase 1: Fetching sources...");
    let phase1_start = Instant::now();
    let spinner = |label: &str| progress_config.source_spinner(multi_progress.as_ref(), label);

    let hdx_branch = async {
        let boundaries = load_district_boundaries(
            &client,
            NEPAL_DISTRICTS_GEOJSON_URL,
            &config.boundary_cache_file,
            &geo,
        )
        .await;
        let result = timed_source(
            Source::HdxOsm,
            config.source_timeout(),
            spinner("HDX_OSM"),
            collect_hdx(&client, &boundaries, &geo, raw_output_dir),
        )
        .await;
        (boundaries.len(), result)
    };

    let (
        (hip_outcome, hip_time),
        (nssd_outcome, nssd_time),
        (arcgis_outcome, arcgis_time),
        (boundaries_loaded, (hdx_outcome, hdx_time)),
    ) = tokio::join!(
        timed_source(
            Source::Hip,
            config.source_timeout(),
            spinner("HIP"),
            collect_hip(&client, &geo),
        ),
        timed_source(
            Source::Nssd,
            config.source_timeout(),
            spinner("NSSD"),
            collect_nssd(&nssd_client),
        ),
        timed_source(
            Source::Arcgis,
            config.source_timeout(),
            spinner("ArcGIS"),
            collect_arcgis(
                &client,
                &geo,
                config.arcgis_page_size,
                config.arcgis_page_delay(),
            ),
        ),
        hdx_branch,
    );

    let mut diagnostics: Vec<SourceDiagnostic> = Vec::new();
    let hip = hip_outcome.into_records(&mut diagnostics);
    let nssd = nssd_outcome.into_records(&mut diagnostics);
    let arcgis = arcgis_outcome.into_records(&mut diagnostics);
    let hdx = hdx_outcome.into_records(&mut diagnostics);

    stats.boundaries_loaded = boundaries_loaded;
    stats.fetch_time = phase1_start.elapsed().as_secs_f64();
    let mut per_source = vec![
        source_stats(Source::Hip, hip.len(), hip_time, &diagnostics),
        source_stats(Source::Nssd, nssd.len(), nssd_time, &diagnostics),
        source_stats(Source::Arcgis, arcgis.len(), arcgis_time, &diagnostics),
        source_stats(Source::HdxOsm, hdx.len(), hdx_time, &diagnostics),
    ];
    info!(
        "Phase 1 completed in {:.2?}: HIP={}, NSSD={}, ArcGIS={}, HDX_OSM={} ({} boundaries)",
        phase1_start.elapsed(),
        hip.len(),
        nssd.len(),
        arcgis.len(),
        hdx.len(),
        boundaries_loaded
    );
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.set_message("Phase 2: Reconciling");
    }

    // Phase 2: two independent merges
    info!("Phase 2: Reconciling records...");
    let phase2_start = Instant::now();
    let hospitals = reconcile(&hip, &arcgis, &nssd, &hdx, false);
    let all_facilities = reconcile(&hip, &arcgis, &nssd, &hdx, true);
    stats.reconcile_time = phase2_start.elapsed().as_secs_f64();
    stats.hospitals_count = hospitals.len();
    stats.all_facilities_count = all_facilities.len();
    for source_stats in &mut per_source {
        source_stats.count_contributions(&hospitals, &all_facilities);
    }
    stats.source_stats = per_source;
    info!(
        "Phase 2 completed: {} hospitals, {} facilities in total",
        hospitals.len(),
        all_facilities.len()
    );
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.set_message("Phase 3: Writing outputs");
    }

    // Phase 3: outputs. Write failures abort the run.
    info!("Phase 3: Writing outputs...");
    let phase3_start = Instant::now();
    let out = &config.output_dir;
    write_json(&out.join(HOSPITALS_JSON), &hospitals).context("Failed to write hospitals JSON")?;
    info!("Saved {} hospitals to {}", hospitals.len(), out.join(HOSPITALS_JSON).display());
    write_json(&out.join(ALL_FACILITIES_JSON), &all_facilities)
        .context("Failed to write all-facilities JSON")?;
    info!(
        "Saved {} facilities to {}",
        all_facilities.len(),
        out.join(ALL_FACILITIES_JSON).display()
    );
    write_csv(&out.join(HOSPITALS_CSV), &hospitals).context("Failed to write hospitals CSV")?;
    info!("Saved CSV to {}", out.join(HOSPITALS_CSV).display());
    stats.export_time = phase3_start.elapsed().as_secs_f64();

    stats.total_processing_time = run_start.elapsed().as_secs_f64();
    write_run_summary(&out.join(RUN_SUMMARY_JSON), &stats).context("Failed to write run summary")?;
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.finish_with_message("Aggregation complete");
    }

    // Final summary
    info!("Aggregation run {} completed successfully.", run_id);
    info!("  Boundaries loaded: {}", stats.boundaries_loaded);
    for s in &stats.source_stats {
        info!(
            "  {:<8} {:>6} records ({:.1}s) -> {} hospitals, {} facilities",
            s.source.as_str(),
            s.records,
            s.fetch_time,
            s.in_hospitals,
            s.in_all_facilities
        );
    }
    for diagnostic in &diagnostics {
        warn!("  {} failed: {}", diagnostic.source, diagnostic.reason);
    }
    info!(
        "  Fetch: {:.2}s, reconcile: {:.2}s, export: {:.2}s, total: {:.2}s",
        stats.fetch_time, stats.reconcile_time, stats.export_time, stats.total_processing_time
    );

    Ok(())
}
