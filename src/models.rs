use serde::{Deserialize, Serialize};

/// One entry from a listing page of the eleduck posts API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
    pub id: String,
    pub url: String,
    pub created_at: String,
    pub title: String,
    pub full_title: String,
    pub summary: String,
    pub views_count: i64,
    pub comments_count: i64,
    pub upvotes_count: i64,
    pub downvotes_count: i64,
    pub category: String,
    pub user_nickname: String,
    pub pinned: bool,
    pub featured: bool,
}

/// One labeled tag block from a detail page, e.g. 招聘类型: 外包零活.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagGroup {
    pub category: String,
    pub values: Vec<String>,
}

/// Read/comment counters scraped from the detail page meta block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reads: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<i64>,
}

/// The fetched and parsed content of one posting. `list_metadata.id` is the
/// canonical identity carried through the rest of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetail {
    pub title: String,
    pub content: String,
    pub tags: Vec<TagGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_info: Option<MetaInfo>,
    pub list_metadata: ListItem,
}

/// The classifier backend's structured verdict. Every field must be present
/// for the reply to count as well-formed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAnalysis {
    pub is_qualified: bool,
    pub analysis: AnalysisDetail,
    /// The rubric allows this to be absent or null for unqualified postings.
    #[serde(default, deserialize_with = "null_to_default")]
    pub extracted_info: ExtractedInfo,
}

fn null_to_default<'de, D>(deserializer: D) -> Result<ExtractedInfo, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<ExtractedInfo>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDetail {
    pub is_recruitment: bool,
    pub is_long_term: bool,
    pub is_development: bool,
    /// None when the posting states no salary.
    pub salary_meets_requirement: Option<bool>,
    pub reasoning: String,
}

/// Free-text fields the rubric asks the backend to extract. Absent values
/// render as the sentinel 未提及.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedInfo {
    #[serde(default)]
    pub company_introduction: Option<String>,
    #[serde(default)]
    pub company_website: Option<String>,
    #[serde(default)]
    pub job_responsibilities: Option<String>,
    #[serde(default)]
    pub skill_requirements: Option<String>,
    #[serde(default)]
    pub salary_benefits: Option<String>,
}

/// Classifier output joined with the detail record that produced it.
/// Qualified instances are persisted newest-first in the results store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub llm_analysis: LlmAnalysis,
    pub original_data: JobDetail,
}

/// Dedup/audit record. At most one per id across the ledger's lifetime,
/// enforced by the unseen filter rather than the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub url: String,
    pub is_qualified: bool,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub reason: String,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_entry_uses_camel_case_timestamp() {
        let entry = LedgerEntry {
            id: "abc123".to_string(),
            url: "https://eleduck.com/posts/abc123".to_string(),
            is_qualified: true,
            created_at: "2025-08-30T10:00:00".to_string(),
            reason: "长期远程开发岗".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("\"created_at\""));

        let back: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.created_at, "2025-08-30T10:00:00");
    }

    #[test]
    fn test_analysis_result_round_trip() {
        let mut result = test_fixtures::analysis_result("0Xfl1r", true);
        result.llm_analysis.extracted_info.company_introduction = Some("远程团队".to_string());

        let json = serde_json::to_string_pretty(&result).unwrap();
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert!(back.llm_analysis.is_qualified);
        assert_eq!(back.llm_analysis.analysis.salary_meets_requirement, None);
        assert_eq!(back.original_data.list_metadata.id, "0Xfl1r");
        assert_eq!(
            back.llm_analysis.extracted_info.company_introduction.as_deref(),
            Some("远程团队")
        );
        assert_eq!(back.llm_analysis.extracted_info.company_website, None);
    }

    #[test]
    fn test_missing_analysis_field_is_rejected() {
        // is_development absent: the reply is not well-formed.
        let raw = r#"{
            "is_qualified": false,
            "analysis": {
                "is_recruitment": true,
                "is_long_term": false,
                "salary_meets_requirement": null,
                "reasoning": "一次性项目"
            }
        }"#;
        assert!(serde_json::from_str::<LlmAnalysis>(raw).is_err());
    }
}
