#![allow(dead_code)]

use oxide_import::prelude::*;
use serde_json::Value;

pub fn record(value: Value) -> ImportRecord {
    value
        .as_object()
        .cloned()
        .unwrap_or_else(|| panic!("Expected a JSON object, got {value}"))
}

pub fn request(source: &str, records: Vec<Value>) -> AnalysisRequest {
    AnalysisRequest::new(source, records.into_iter().map(record).collect())
}

pub fn analyze(request: &AnalysisRequest, snapshot: &SchemaSnapshot) -> AnalysisResponse {
    ImportAnalyzer::default()
        .analyze(request, snapshot)
        .unwrap_or_else(|e| panic!("Analysis failed for {}: {e}", request.source_name))
}

pub fn contacts_catalog() -> SchemaSnapshot {
    SchemaSnapshot::new()
        .table(
            TableDescriptor::new("users")
                .column(ColumnDescriptor::new("id", "uuid").primary_key())
                .column(ColumnDescriptor::new("email", "text").not_null()),
        )
        .table(
            TableDescriptor::new("contacts")
                .column(ColumnDescriptor::new("name", "text"))
                .column(ColumnDescriptor::new("email", "text"))
                .column(ColumnDescriptor::new("phone", "text")),
        )
}
