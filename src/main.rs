use std::sync::Arc;

use docflow::agents::AgentRegistry;
use docflow::classify::{Classifier, IntentClassifier, OpenRouterClassifier};
use docflow::config::{IntentApiConfig, PipelineConfig};
use docflow::pipeline::{DocumentProcessor, InputDocument};
use docflow::store::{LibSqlBackend, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = PipelineConfig::from_env()?;

    eprintln!("📄 Docflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());

    // Remote intent classification is optional; without an API key the
    // pipeline runs on heuristics alone.
    let remote: Option<Arc<dyn IntentClassifier>> = match IntentApiConfig::from_env() {
        Some(api) => {
            eprintln!("   Intent API: {} (remote classification enabled)", api.model);
            Some(Arc::new(OpenRouterClassifier::new(
                api.api_key,
                api.model,
                api.base_url,
            )))
        }
        None => {
            eprintln!("   Intent API: disabled (OPENROUTER_API_KEY not set)");
            None
        }
    };
    let classifier = Classifier::new(remote, config.remote_timeout);

    let store: Arc<dyn RecordStore> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
    let processor = DocumentProcessor::new(classifier, AgentRegistry::standard(), store);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("   No files given — running built-in samples.\n");
        run_samples(&processor).await;
        return Ok(());
    }

    let thread_id = std::env::var("DOCFLOW_THREAD_ID").ok();
    for arg in &args {
        match processor
            .process_file(std::path::Path::new(arg), thread_id.clone())
            .await
        {
            Ok(record) => print_record(&record),
            Err(e) => eprintln!("✗ {arg}: {e}"),
        }
    }

    if let Some(thread_id) = &thread_id {
        let context = processor.thread_context(thread_id).await?;
        println!("{}", serde_json::to_string_pretty(&context)?);
    }

    Ok(())
}

/// Demo inputs exercising each format and intent path.
async fn run_samples(processor: &DocumentProcessor) {
    let thread = "demo".to_string();
    let samples = vec![
        InputDocument::from_text(
            r#"{
                "amount": 1250.00,
                "vendor": "Tech Solutions Inc",
                "date": "2024-01-15",
                "items": [{"description": "Software License", "price": 1000.00}],
                "invoice_number": "INV-2024-001"
            }"#,
            Some("invoice.json".into()),
            Some(thread.clone()),
        ),
        InputDocument::from_text(
            "From: procurement@example.com\n\
             To: sales@vendor.com\n\
             Subject: URGENT: please quote ASAP\n\
             \n\
             We need a quotation for:\n\
             - 50 office chairs\n\
             - 10 standing desks\n\
             Please provide pricing and lead times by end of week.",
            Some("rfq.eml".into()),
            Some(thread.clone()),
        ),
        InputDocument::from_text(
            "From: customer@example.com\n\
             Subject: Defective unit\n\
             \n\
             The product stopped working after two days. Very disappointed.\n\
             Please send a refund or replacement.",
            None,
            Some(thread.clone()),
        ),
    ];

    for record in processor.process_batch(samples).await {
        print_record(&record);
    }

    match processor.thread_context(&thread).await {
        Ok(context) => match serde_json::to_string_pretty(&context) {
            Ok(json) => println!("\nThread context:\n{json}"),
            Err(e) => eprintln!("✗ context serialization: {e}"),
        },
        Err(e) => eprintln!("✗ thread context: {e}"),
    }

    match processor.recent_summaries(10).await {
        Ok(summaries) => {
            println!("\nRecent records:");
            for summary in summaries {
                println!("  {summary}");
            }
        }
        Err(e) => eprintln!("✗ recent records: {e}"),
    }
}

fn print_record(record: &docflow::pipeline::ProcessingRecord) {
    println!(
        "✓ {} [{} / {} @ {:.2} via {}] agent={} fields={} anomalies={}",
        record.id,
        record.classification.format.as_str(),
        record.classification.intent.as_str(),
        record.classification.confidence,
        record.classification.classified_by,
        record.extraction.agent.as_str(),
        record.extraction.fields.len(),
        record.extraction.anomalies.len(),
    );
    for anomaly in &record.extraction.anomalies {
        println!("    ⚠ {anomaly:?}");
    }
}
