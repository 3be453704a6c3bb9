use ekp_extract::{extract_pages, PipelineConfig};
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_lines <pdf_path> [max_page | min-max]");
        std::process::exit(1);
    }

    let range = args.get(2).map(|s| s.as_str()).unwrap_or("1-3");
    let (min_page, max_page): (usize, usize) = if let Some((a, b)) = range.split_once('-') {
        (a.parse().unwrap_or(1), b.parse().unwrap_or(3))
    } else {
        (1, range.parse().unwrap_or(3))
    };

    let pages = extract_pages(&args[1]).expect("Failed to extract");
    let config = PipelineConfig::default();

    for page in pages
        .iter()
        .filter(|p| (min_page..=max_page).contains(&(p.index + 1)))
    {
        let lines = page
            .view()
            .outside_bbox(config.footer_bbox)
            .text_lines(config.line_tolerance);
        println!(
            "=== PAGE {} ({} lines, {} rules) ===",
            page.number(),
            lines.len(),
            page.rules.len()
        );
        for line in &lines {
            let marker = if line.text.trim() == config.main_roster_marker {
                "M"
            } else if line.text.trim() == config.youth_roster_marker {
                "Y"
            } else {
                " "
            };
            println!("{} [{}] {:?}", marker, line.bbox, line.text);
        }
        for rule in &page.rules {
            println!("  rule y={:7.1} x={:7.1}..{:7.1}", rule.y, rule.x0, rule.x1);
        }
        println!();
    }
}
