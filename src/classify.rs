use anyhow::{Context, Result};

use crate::ai::AIProvider;
use crate::models::{AnalysisResult, JobDetail, LlmAnalysis};

const MAX_REPLY_TOKENS: u32 = 2000;

/// Build the rubric prompt for one posting: title, body content, and the
/// tag groups flattened one per line.
pub fn build_prompt(detail: &JobDetail) -> String {
    let mut categories_text = String::new();
    for tag in &detail.tags {
        if !tag.category.is_empty() && !tag.values.is_empty() {
            categories_text.push_str(&format!("- {}: {}\n", tag.category, tag.values.join(", ")));
        }
    }
    if categories_text.is_empty() {
        categories_text.push_str("无");
    }

    format!(
        r#"
请分析以下招聘信息，判断是否符合标准并提取关键信息。

## 输入信息：
**标题：** {title}

**内容：**
{content}

**分类标签：**
{categories_text}

## 判断标准：
1. 是否是招聘信息
2. 不是一次性项目，而是长期的全职或兼职工作
3. 是开发类工作，不是产品运营类
4. 过滤掉时薪**明显**低于 100 元的工作

## 请按以下格式返回分析结果：

```json
{{
    "is_qualified": true/false,
    "analysis": {{
        "is_recruitment": true/false,
        "is_long_term": true/false,
        "is_development": true/false,
        "salary_meets_requirement": true/false/null,
        "reasoning": "详细分析原因（20 字以内，尽量少）"
    }},
    "extracted_info": {{
        "company_introduction": "公司/产品介绍",
        "company_website": "公司/产品网站",
        "job_responsibilities": "职位职责",
        "skill_requirements": "技能要求",
        "salary_benefits": "薪资待遇"
    }}
}}
```

注意：
- 如果不符合标准，extracted_info 可以为空或null
- 如果信息中没有明确的薪资信息，salary_meets_requirement 设为 null
- 尽量从内容中提取具体信息，如果某项信息不存在则标明"未提及"
"#,
        title = detail.title,
        content = detail.content,
        categories_text = categories_text,
    )
}

/// Strip an optional Markdown code fence wrapping the backend's reply.
pub fn strip_fence(reply: &str) -> String {
    let mut cleaned = reply.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim().to_string()
}

/// Parse a fence-stripped reply into the analysis schema. A reply that does
/// not match the schema is an error carrying the raw text for diagnosis.
pub fn parse_reply(reply: &str) -> Result<LlmAnalysis> {
    let cleaned = strip_fence(reply);
    serde_json::from_str(&cleaned)
        .with_context(|| format!("Reply did not match the analysis schema: {}", snippet(&cleaned)))
}

fn snippet(text: &str) -> String {
    let max = 200;
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Classify one posting: build the prompt, call the backend once (no
/// history), and validate the reply against the schema.
pub fn classify(provider: &dyn AIProvider, detail: &JobDetail) -> Result<AnalysisResult> {
    let prompt = build_prompt(detail);
    let reply = provider.complete(&prompt, MAX_REPLY_TOKENS)?;
    let llm_analysis = parse_reply(&reply)?;

    Ok(AnalysisResult {
        llm_analysis,
        original_data: detail.clone(),
    })
}
