//! Report prompt construction.
//!
//! A prompt has three parts:
//!
//! 1. a static instruction block per report language, built once per process
//! 2. a dynamic block describing this search
//! 3. the merged dataset as pretty-printed JSON, grouped by stream

use std::fmt::Write as _;
use std::sync::OnceLock;

use serde_json::json;

use crate::models::{Language, SearchRequest};
use crate::pipeline::merge::MergedDataset;

/// A system + user prompt pair for the report model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds report prompts from a merged dataset
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    downgrade_threshold: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(3)
    }
}

impl PromptBuilder {
    pub fn new(downgrade_threshold: usize) -> Self {
        Self {
            downgrade_threshold,
        }
    }

    /// Build the prompt for one search
    pub fn build(&self, dataset: &MergedDataset, request: &SearchRequest) -> Prompt {
        let language = request.language();

        let mut user = String::new();
        user.push_str(&self.dynamic_block(request, language));
        user.push_str("\n\n");
        user.push_str(&dataset_block(dataset, language));

        Prompt {
            system: static_block(language).to_string(),
            user,
        }
    }

    fn dynamic_block(&self, request: &SearchRequest, language: Language) -> String {
        let p = &request.passengers;
        let return_date = request
            .return_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| match language {
                Language::En => "none (one-way)".to_string(),
                Language::Zh => "无（单程）".to_string(),
            });
        let preferences = if request.preferences.trim().is_empty() {
            match language {
                Language::En => "none stated",
                Language::Zh => "未说明",
            }
        } else {
            request.preferences.trim()
        };

        let mut out = String::new();
        match language {
            Language::En => {
                let _ = writeln!(out, "## Search");
                let _ = writeln!(out, "- Route: {} → {}", request.origin, request.destination);
                let _ = writeln!(out, "- Departure date: {}", request.departure_date);
                let _ = writeln!(out, "- Return date: {}", return_date);
                let _ = writeln!(
                    out,
                    "- Passengers: {} adult(s), {} child(ren), {} infant(s) in seat, {} infant(s) on lap",
                    p.adults, p.children, p.infants_in_seat, p.infants_on_lap
                );
                let _ = writeln!(out, "- Cabin: {}", request.cabin.name());
                let _ = writeln!(out, "- Currency: {}", request.currency);
                let _ = writeln!(out, "- Traveller preferences: {}", preferences);
                let _ = writeln!(out);
                let _ = writeln!(out, "## Smart downgrade");
                let _ = write!(
                    out,
                    "If fewer than {} flights satisfy every stated preference, say so plainly, \
                     then recommend the best available alternatives and explain which \
                     preference each one relaxes.",
                    self.downgrade_threshold
                );
            }
            Language::Zh => {
                let _ = writeln!(out, "## 搜索条件");
                let _ = writeln!(out, "- 航线：{} → {}", request.origin, request.destination);
                let _ = writeln!(out, "- 出发日期：{}", request.departure_date);
                let _ = writeln!(out, "- 返程日期：{}", return_date);
                let _ = writeln!(
                    out,
                    "- 乘客：成人 {} 位，儿童 {} 位，占座婴儿 {} 位，不占座婴儿 {} 位",
                    p.adults, p.children, p.infants_in_seat, p.infants_on_lap
                );
                let _ = writeln!(out, "- 舱位：{}", request.cabin.name());
                let _ = writeln!(out, "- 币种：{}", request.currency);
                let _ = writeln!(out, "- 用户偏好：{}", preferences);
                let _ = writeln!(out);
                let _ = writeln!(out, "## 智能降级");
                let _ = write!(
                    out,
                    "如果完全满足所有偏好的航班少于 {} 个，请如实说明，然后推荐最佳替代方案，\
                     并指出每个方案放宽了哪项偏好。",
                    self.downgrade_threshold
                );
            }
        }
        out
    }
}

fn dataset_block(dataset: &MergedDataset, language: Language) -> String {
    let grouped = json!({
        "structured": dataset.structured,
        "hidden_city": dataset.hidden_city,
        "ai_suggested_hidden_city": dataset.suggested,
    });
    let body = serde_json::to_string_pretty(&grouped).unwrap_or_else(|_| "{}".to_string());

    let heading = match language {
        Language::En => "## Flight data",
        Language::Zh => "## 航班数据",
    };
    format!("{}\n```json\n{}\n```", heading, body)
}

static EN_BLOCK: OnceLock<String> = OnceLock::new();
static ZH_BLOCK: OnceLock<String> = OnceLock::new();

/// The fixed instruction block for a language
pub fn static_block(language: Language) -> &'static str {
    match language {
        Language::En => EN_BLOCK.get_or_init(english_block),
        Language::Zh => ZH_BLOCK.get_or_init(chinese_block),
    }
}

fn english_block() -> String {
    [
        "You are a flight search analyst. You receive flight data gathered from several \
         search backends and write a clear, well-organized recommendation report in markdown.",
        "",
        "# Report structure",
        "Use exactly these sections, in this order:",
        "1. **Summary**: the best overall option, the cheapest option and the fastest option, one line each.",
        "2. **True direct flights**: nonstop flights to the requested destination.",
        "3. **Hidden-city direct**: itineraries whose first leg lands at the requested destination without stopping elsewhere.",
        "4. **Hidden-city connecting**: itineraries that land at the requested destination after one or more other stops.",
        "5. **Other connecting flights**: ordinary connections to the requested destination.",
        "6. **Recommendations**: the top 3 overall, each with its score and a one-sentence reason.",
        "7. **Notes and risks**: practical caveats.",
        "Omit a section's table if it has no flights, but keep the heading with a short note.",
        "",
        "# Classification rules",
        "- A flight is a **true direct** flight only if it has exactly one leg and that leg arrives at the requested destination.",
        "- A **hidden-city** itinerary is ticketed beyond the requested destination; the traveller leaves at the layover that matches the destination.",
        "- It is **hidden-city direct** if the first leg arrives at the requested destination.",
        "- It is **hidden-city connecting** if the destination is reached only after other stops.",
        "- Records flagged `ai_recommended` came from model-suggested onward cities; label them as AI-suggested.",
        "- For every hidden-city itinerary, warn that only carry-on baggage is possible, that the return or onward segments will be cancelled, and that airlines may penalize the practice.",
        "",
        "# Scoring",
        "Give each recommended flight a score from 0 to 100:",
        "- 40% price (cheapest in the dataset scores full marks)",
        "- 30% total duration (shortest scores full marks)",
        "- 20% comfort (fewer stops, reasonable departure times, full-service carrier)",
        "- 10% match with the traveller's stated preferences",
        "",
        "# Integrity",
        "Never invent flights, prices, times, carriers or flight numbers. Use only the data provided. \
         If data is missing for a field, write \"n/a\". Quote prices in the currency given in the data.",
    ]
    .join("\n")
}

fn chinese_block() -> String {
    [
        "你是一名机票搜索分析师。你会收到来自多个搜索来源的航班数据，请用 markdown 撰写一份清晰、有条理的推荐报告。",
        "",
        "# 报告结构",
        "严格按以下顺序使用这些章节：",
        "1. **概要**：综合最佳、最便宜、最快的选项，各一行。",
        "2. **真直飞**：直达目的地的不经停航班。",
        "3. **隐藏城市直达**：第一段即降落在目的地的隐藏城市行程。",
        "4. **隐藏城市中转**：经过其他经停后才降落在目的地的隐藏城市行程。",
        "5. **其他中转航班**：普通的中转航班。",
        "6. **推荐**：综合前三名，附评分和一句理由。",
        "7. **注意事项与风险**：实用提示。",
        "某章节没有航班时省略表格，但保留标题并简短说明。",
        "",
        "# 分类规则",
        "- 只有一段航程且到达目的地的航班才是**真直飞**。",
        "- **隐藏城市**行程的票面终点在目的地之外，旅客在与目的地匹配的经停点下机。",
        "- 如果第一段就到达目的地，则为**隐藏城市直达**。",
        "- 如果经过其他经停后才到达目的地，则为**隐藏城市中转**。",
        "- 标记为 `ai_recommended` 的记录来自模型推荐的后续城市，请标注为 AI 推荐。",
        "- 对每个隐藏城市行程都要提醒：只能携带手提行李，后续或返程航段会被取消，航空公司可能对此进行处罚。",
        "",
        "# 评分",
        "为每个推荐航班给出 0 到 100 的评分：",
        "- 40% 价格（数据中最便宜的得满分）",
        "- 30% 总时长（最短的得满分）",
        "- 20% 舒适度（经停少、出发时间合理、全服务航司）",
        "- 10% 与用户偏好的匹配度",
        "",
        "# 真实性",
        "绝不编造航班、价格、时间、航司或航班号。只使用提供的数据。缺失的字段写“暂无”。价格使用数据中给出的币种。",
    ]
    .join("\n")
}
