use crate::models::AnalysisResult;

/// Sentinel for fields the backend could not extract.
pub const NOT_MENTIONED: &str = "未提及";

const TABLE_HEADER: &str = "| URL | ID | 公司介绍 | 公司网站 | 技能要求 | 薪资待遇 |\n\
                            |-----|----|---------|---------|---------|---------|\n";

const CELL_MAX_CHARS: usize = 100;

/// Full tabular report, rebuilt from the entire merged qualified collection
/// on every run.
pub fn render_report(qualified: &[AnalysisResult]) -> String {
    if qualified.is_empty() {
        return "## 分析结果\n\n暂无符合条件的招聘信息。\n".to_string();
    }

    let mut markdown = String::from("## 招聘信息分析结果\n\n");
    markdown.push_str(&format!("共找到 {} 个符合条件的招聘信息：\n\n", qualified.len()));
    markdown.push_str(TABLE_HEADER);
    for result in qualified {
        markdown.push_str(&render_row(result));
    }
    markdown
}

/// Notification block for the new qualified subset of one run. The caller
/// prepends it to the notification file.
pub fn render_notification(new_qualified: &[AnalysisResult], generated_at: &str) -> String {
    if new_qualified.is_empty() {
        return String::new();
    }

    let mut markdown = format!("# 新职位通知 - {}\n\n", generated_at);
    markdown.push_str(&format!(
        "发现 {} 个新的符合条件的招聘信息：\n\n",
        new_qualified.len()
    ));
    markdown.push_str(TABLE_HEADER);
    for result in new_qualified {
        markdown.push_str(&render_row(result));
    }
    markdown
}

fn render_row(result: &AnalysisResult) -> String {
    let meta = &result.original_data.list_metadata;
    let info = &result.llm_analysis.extracted_info;

    let company_intro = truncate_cell(&clean_cell(info.company_introduction.as_deref()));
    let company_website = clean_cell(info.company_website.as_deref());
    let skill_req = truncate_cell(&clean_cell(info.skill_requirements.as_deref()));
    let salary = clean_cell(info.salary_benefits.as_deref());

    format!(
        "| [{id}]({url}) | {id} | {intro} | {website} | {skills} | {salary} |\n",
        id = meta.id,
        url = meta.url,
        intro = company_intro,
        website = company_website,
        skills = skill_req,
        salary = salary,
    )
}

/// Normalize a cell: newlines become spaces and pipes become full-width
/// pipes so the value cannot break the table; missing values render as the
/// sentinel.
fn clean_cell(value: Option<&str>) -> String {
    match value {
        Some(text) if !text.trim().is_empty() && text != NOT_MENTIONED => {
            text.replace('\n', " ").replace('|', "｜").trim().to_string()
        }
        _ => NOT_MENTIONED.to_string(),
    }
}

/// Cap a cell at 100 characters (character count, not bytes) with an
/// ellipsis marker.
fn truncate_cell(text: &str) -> String {
    if text.chars().count() > CELL_MAX_CHARS {
        let truncated: String = text.chars().take(CELL_MAX_CHARS).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}
