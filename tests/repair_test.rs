use anyhow::Result;
use roameo_scraper::repair::{RepairEngine, Strategy};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_timeout_listing_with_quotes_and_nested_page() -> Result<()> {
    let text = r#"[
  {'name': 'Bar A', 'source_categories': ['Bar'],},
  [
    {name: 'Bar B', 'source_categories': ['Bar']}
  ]
]"#;
    let repaired = RepairEngine::new().repair(text)?;

    assert_eq!(repaired.report.strategy, Strategy::Lenient);
    assert_eq!(repaired.report.flattened, 1);
    assert_eq!(
        repaired.value,
        json!([
            {"name": "Bar A", "source_categories": ["Bar"]},
            {"name": "Bar B", "source_categories": ["Bar"]}
        ])
    );
    Ok(())
}

#[test]
fn test_chatty_model_answer_is_extracted() -> Result<()> {
    let answer = "Here is the enrichment you asked for:\n```json\n{\"enrich_type\": \"events\", \"enrich_hiddenGemScore\": 64}\n```\nLet me know if you need more.";
    let repaired = RepairEngine::for_llm_response().repair(answer)?;

    assert_eq!(repaired.report.strategy, Strategy::ResponseExtraction);
    assert_eq!(repaired.value["enrich_hiddenGemScore"], 64);
    Ok(())
}

#[test]
fn test_answer_cut_off_mid_object_is_closed() -> Result<()> {
    let answer = r#"{"enrich_type": "events", "enrich_tagsType": {"Food": 50"#;
    let repaired = RepairEngine::for_llm_response().repair(answer)?;

    assert_eq!(repaired.report.strategy, Strategy::CloseTruncated);
    assert_eq!(
        repaired.value,
        json!({"enrich_type": "events", "enrich_tagsType": {"Food": 50}})
    );
    Ok(())
}

#[test]
fn test_repaired_file_round_trips_through_disk() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("timeout_bar_final.json");
    fs::write(&input, "[{\"name\": \"Caf\u{e9}\", \"tags\": [\"Bar\",],},]")?;

    let text = fs::read_to_string(&input)?;
    let repaired = RepairEngine::new().repair(&text)?;
    assert_eq!(repaired.value, json!([{"name": "Café", "tags": ["Bar"]}]));
    Ok(())
}

#[test]
fn test_truncated_dump_keeps_records_after_nested_arrays() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("timeout_bar_final.json");
    fs::write(
        &input,
        r#"[{"name": "Bar A", "tags": ["rooftop"]}, {"name": "Bar B"}, {"name": "Bar C", "note": "cut"#,
    )?;

    let repaired = RepairEngine::new().repair(&fs::read_to_string(&input)?)?;
    assert_eq!(repaired.report.strategy, Strategy::CloseTruncated);
    assert_eq!(repaired.value.as_array().map(Vec::len), Some(3));
    assert_eq!(repaired.value[2]["note"], "cut");
    Ok(())
}

#[test]
fn test_answer_cut_mid_literal_drops_the_member() -> Result<()> {
    let answer = r#"{"enrich_type": "events", "enrich_isFree": tru"#;
    let repaired = RepairEngine::for_llm_response().repair(answer)?;

    assert_eq!(repaired.value, json!({"enrich_type": "events"}));
    Ok(())
}
