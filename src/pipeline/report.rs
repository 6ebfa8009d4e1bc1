//! Locally assembled reports for runs where the model is not consulted or fails.

use std::fmt::Write as _;

use crate::models::{CanonicalFlightRecord, Language, SearchRequest};
use crate::pipeline::merge::{sort_by_price, MergedDataset};

const CHEAPEST_PER_STREAM: usize = 5;

/// Report for a search where every stream came back empty
pub fn no_flights_report(request: &SearchRequest) -> String {
    let date = match request.return_date {
        Some(back) => format!("{} / {}", request.departure_date, back),
        None => request.departure_date.to_string(),
    };

    match request.language() {
        Language::En => format!(
            "# No flights found\n\n\
             No search backend returned a usable flight for **{} → {}** on {}.\n\n\
             Try nearby dates, a nearby airport, or relaxing the stop and cabin preferences.",
            request.origin, request.destination, date
        ),
        Language::Zh => format!(
            "# 未找到航班\n\n\
             所有搜索来源都没有返回 **{} → {}**（{}）的可用航班。\n\n\
             可以尝试相邻日期、附近机场，或放宽经停和舱位要求。",
            request.origin, request.destination, date
        ),
    }
}

/// Plain statistics report used when both report models failed
pub fn degraded_report(dataset: &MergedDataset, request: &SearchRequest, reasons: &[String]) -> String {
    let zh = request.language() == Language::Zh;
    let mut out = String::new();

    if zh {
        let _ = writeln!(out, "# 航班数据摘要：{} → {}\n", request.origin, request.destination);
        let _ = writeln!(out, "> AI 分析暂不可用，以下为原始统计数据。\n");
    } else {
        let _ = writeln!(out, "# Flight data summary: {} → {}\n", request.origin, request.destination);
        let _ = writeln!(
            out,
            "> AI analysis is currently unavailable. The figures below are plain statistics.\n"
        );
    }

    if !reasons.is_empty() {
        let _ = writeln!(out, "{}", if zh { "原因：" } else { "Reasons:" });
        for reason in reasons {
            let _ = writeln!(out, "- {}", reason);
        }
        let _ = writeln!(out);
    }

    let counts = dataset.counts();
    let _ = writeln!(out, "{}", if zh { "## 各来源数量\n" } else { "## Results per source\n" });
    for (source, records) in dataset.streams() {
        let _ = writeln!(out, "- {}: {}", source.name(), records.len());
    }
    let _ = writeln!(out, "- {}: {}\n", if zh { "合计" } else { "Total" }, counts.total());

    if let Some((low, high)) = price_range(dataset) {
        let _ = writeln!(out, "{}", if zh { "## 价格区间\n" } else { "## Price range\n" });
        let _ = writeln!(out, "{} – {}\n", money(low), money(high));
    }

    for (source, records) in dataset.streams() {
        if records.is_empty() {
            continue;
        }

        let _ = writeln!(
            out,
            "## {} ({})\n",
            source.name(),
            if zh { "最便宜" } else { "cheapest" }
        );
        if zh {
            let _ = writeln!(out, "| 航线 | 航司 | 经停 | 价格 |");
        } else {
            let _ = writeln!(out, "| Route | Carrier | Stops | Price |");
        }
        let _ = writeln!(out, "|---|---|---|---|");

        let mut cheapest = records.to_vec();
        sort_by_price(&mut cheapest);
        for record in cheapest.iter().take(CHEAPEST_PER_STREAM) {
            let carrier = record.carriers();
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                record.route(),
                if carrier.is_empty() { "-" } else { carrier.as_str() },
                record.stop_count,
                money(record)
            );
        }
        let _ = writeln!(out);
    }

    out.trim_end().to_string()
}

fn price_range(dataset: &MergedDataset) -> Option<(&CanonicalFlightRecord, &CanonicalFlightRecord)> {
    let all = || dataset.streams().into_iter().flat_map(|(_, records)| records.iter());
    let low = all().min_by(|a, b| a.price.amount.total_cmp(&b.price.amount))?;
    let high = all().max_by(|a, b| a.price.amount.total_cmp(&b.price.amount))?;
    Some((low, high))
}

fn money(record: &CanonicalFlightRecord) -> String {
    if record.price.currency.is_empty() {
        format!("{:.2}", record.price.amount)
    } else {
        format!("{:.2} {}", record.price.amount, record.price.currency)
    }
}
