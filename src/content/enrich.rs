use std::sync::OnceLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use super::html_escape;
use crate::models::{Article, MediaInventory, MediaItem};

/// Related-articles block appended to a draft. Empty when there is nothing
/// to link to.
pub fn render_related_links(articles: &[Article]) -> String {
    let items: Vec<String> = articles
        .iter()
        .filter_map(|article| {
            let url = article.remote_url.as_deref()?.trim();
            if url.is_empty() {
                return None;
            }
            Some(format!(
                "<li><a href=\"{}\">{}</a></li>",
                html_escape(url),
                html_escape(&article.title)
            ))
        })
        .collect();

    if items.is_empty() {
        return String::new();
    }

    format!(
        "\n<section class=\"llmgeo-related\">\n<h2>Related articles</h2>\n<ul>\n{}\n</ul>\n</section>\n",
        items.join("\n")
    )
}

/// Up to `count` usable images; a random sample when more are available.
pub fn select_images<R: Rng + ?Sized>(
    media: &MediaInventory,
    count: usize,
    rng: &mut R,
) -> Vec<MediaItem> {
    let usable = media.usable();
    if usable.len() <= count {
        return usable.into_iter().cloned().collect();
    }
    usable
        .choose_multiple(rng, count)
        .map(|item| (*item).clone())
        .collect()
}

pub(super) fn render_figure(item: &MediaItem) -> String {
    let mut img = format!(
        "<img src=\"{}\" alt=\"{}\"",
        html_escape(item.url.trim()),
        html_escape(item.alt.trim())
    );
    if let Some(width) = item.width {
        img.push_str(&format!(" width=\"{width}\""));
    }
    if let Some(height) = item.height {
        img.push_str(&format!(" height=\"{height}\""));
    }
    img.push_str(" loading=\"lazy\"/>");

    let caption = item.caption_or_title();
    if caption.is_empty() {
        format!("<figure class=\"llmgeo-figure\">{img}</figure>")
    } else {
        format!(
            "<figure class=\"llmgeo-figure\">{img}<figcaption>{}</figcaption></figure>",
            html_escape(caption)
        )
    }
}

static PARAGRAPH_END: OnceLock<Regex> = OnceLock::new();
static SECTION_START: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| {
        Regex::new(pattern).unwrap_or_else(|e| unreachable!("invalid pattern {pattern}: {e}"))
    })
}

fn first_paragraph_end(html: &str) -> Option<usize> {
    compiled(&PARAGRAPH_END, r"(?i)</p\s*>")
        .find(html)
        .map(|m| m.end())
}

fn section_starts(html: &str, from: usize) -> Vec<usize> {
    compiled(&SECTION_START, r"(?i)<h2[\s>]")
        .find_iter(&html[from..])
        .map(|m| from + m.start())
        .collect()
}

/// Places the first figure after the first paragraph and the rest before the
/// middle `<h2>` section. Without a paragraph, all figures are prepended.
pub fn inject_images(html: &str, images: &[MediaItem]) -> String {
    let figures: Vec<String> = images.iter().map(render_figure).collect();
    let Some((first, rest)) = figures.split_first() else {
        return html.to_string();
    };

    let Some(after_first) = first_paragraph_end(html) else {
        return format!("{}\n{}", figures.join("\n"), html);
    };

    let headings = section_starts(html, after_first);
    let midpoint = headings.get(headings.len() / 2).copied();

    let mut out = String::with_capacity(html.len() + figures.iter().map(String::len).sum::<usize>() + 8);
    out.push_str(&html[..after_first]);
    out.push('\n');
    out.push_str(first);

    match midpoint {
        Some(mid) if !rest.is_empty() => {
            out.push_str(&html[after_first..mid]);
            out.push_str(&rest.join("\n"));
            out.push('\n');
            out.push_str(&html[mid..]);
        }
        _ => {
            for figure in rest {
                out.push('\n');
                out.push_str(figure);
            }
            out.push_str(&html[after_first..]);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn image(i: usize) -> MediaItem {
        MediaItem {
            url: format!("https://acme.test/{i}.jpg"),
            alt: format!("alt {i}"),
            caption: format!("caption {i}"),
            width: Some(640),
            height: None,
            ..Default::default()
        }
    }

    fn article(title: &str, url: Option<&str>) -> Article {
        Article {
            id: 1,
            site_id: 1,
            remote_post_id: 1,
            remote_status: "draft".into(),
            remote_url: url.map(str::to_string),
            title: title.into(),
            content: String::new(),
            excerpt: String::new(),
            topic_key: Some("roofing".into()),
            fingerprint: "f".into(),
            meta: json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn related_block_is_empty_without_links() {
        assert_eq!(render_related_links(&[]), "");
        assert_eq!(render_related_links(&[article("No url", None)]), "");
    }

    #[test]
    fn related_block_lists_links_in_order() {
        let block = render_related_links(&[
            article("Newest & best", Some("https://acme.test/b")),
            article("Older", Some("https://acme.test/a")),
        ]);
        let newest = block.find("https://acme.test/b").unwrap();
        let older = block.find("https://acme.test/a").unwrap();
        assert!(newest < older);
        assert!(block.contains("Newest &amp; best"));
        assert!(block.contains("<section class=\"llmgeo-related\">"));
    }

    #[test]
    fn selection_samples_without_exceeding_count() {
        let media = MediaInventory {
            count: 6,
            items: (0..6).map(image).collect(),
        };
        let mut rng = StdRng::seed_from_u64(7);
        let picked = select_images(&media, 3, &mut rng);
        assert_eq!(picked.len(), 3);
        let mut urls: Vec<&str> = picked.iter().map(|i| i.url.as_str()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 3);

        let small = MediaInventory {
            count: 2,
            items: (0..2).map(image).collect(),
        };
        assert_eq!(select_images(&small, 3, &mut rng), small.items);
        assert!(select_images(&media, 0, &mut rng).is_empty());
    }

    #[test]
    fn figure_has_caption_and_dimensions() {
        let figure = render_figure(&image(1));
        assert!(figure.contains("src=\"https://acme.test/1.jpg\""));
        assert!(figure.contains("width=\"640\""));
        assert!(!figure.contains("height="));
        assert!(figure.contains("<figcaption>caption 1</figcaption>"));

        let bare = render_figure(&MediaItem {
            url: "https://acme.test/x.jpg".into(),
            ..Default::default()
        });
        assert!(!bare.contains("figcaption"));
    }

    #[test]
    fn first_image_follows_first_paragraph_and_rest_go_to_midpoint() {
        let html = "<p>Intro</p><h2>A</h2><p>a</p><h2>B</h2><p>b</p><h2>C</h2><p>c</p>";
        let out = inject_images(html, &[image(0), image(1), image(2)]);

        let intro_end = out.find("</p>").unwrap();
        let first = out.find("0.jpg").unwrap();
        let heading_a = out.find("<h2>A</h2>").unwrap();
        let heading_b = out.find("<h2>B</h2>").unwrap();
        let second = out.find("1.jpg").unwrap();
        let third = out.find("2.jpg").unwrap();

        assert!(intro_end < first && first < heading_a);
        assert!(heading_a < second && second < third && third < heading_b);
    }

    #[test]
    fn without_sections_all_images_follow_first_paragraph() {
        let out = inject_images("<P>Intro</P><p>More</p>", &[image(0), image(1)]);
        let intro_end = out.find("</P>").unwrap();
        let more = out.find("<p>More").unwrap();
        let second = out.find("1.jpg").unwrap();
        assert!(intro_end < second && second < more);
    }

    #[test]
    fn paragraph_and_heading_patterns_tolerate_spacing_and_case() {
        assert_eq!(first_paragraph_end("<p>a</P >b"), Some(9));
        assert_eq!(first_paragraph_end("<div>none</div>"), None);
        let html = "<p>x</p><H2 id=\"a\">A</H2><h2>B</h2><h2x>";
        assert_eq!(section_starts(html, 8), vec![8, 25]);
    }

    #[test]
    fn without_paragraph_images_are_prepended() {
        let out = inject_images("<div>No paragraphs</div>", &[image(0)]);
        assert!(out.starts_with("<figure"));
        assert!(out.ends_with("<div>No paragraphs</div>"));
        assert_eq!(inject_images("<p>x</p>", &[]), "<p>x</p>");
    }
}
