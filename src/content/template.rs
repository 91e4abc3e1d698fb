use serde_json::json;

use super::enrich::render_figure;
use super::{html_escape, humanize_topic};
use crate::models::{DraftRequest, GeneratedContent, MediaInventory, MediaItem, SiteProfile};

pub(super) fn build(
    profile: &SiteProfile,
    media: &MediaInventory,
    request: &DraftRequest,
) -> GeneratedContent {
    let topic = humanize_topic(&request.topic_key);
    let topic_lower = topic.to_lowercase();
    let company = profile.display_name();
    let area = profile.service_area.trim();

    let title = if area.is_empty() {
        format!("{topic}: what {company} wants you to know")
    } else {
        format!("{topic} in {area}: what {company} wants you to know")
    };
    let excerpt = if area.is_empty() {
        format!("A practical overview of {topic_lower} by {company}.")
    } else {
        format!("A practical overview of {topic_lower} in {area} by {company}.")
    };

    // Order-preserving so the same request always yields the same HTML.
    let images: Vec<MediaItem> = media
        .usable()
        .into_iter()
        .take(request.images_count as usize)
        .cloned()
        .collect();

    let mut html = String::new();
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&title)));
    html.push_str(&format!(
        "<p class=\"llmgeo-intro\">{}</p>\n",
        html_escape(&intro(profile, &topic_lower))
    ));

    html.push_str(&format!(
        "<h2>Why {} matters</h2>\n",
        html_escape(&topic_lower)
    ));
    html.push_str(&format!(
        "<p>{}</p>\n",
        html_escape(&format!(
            "Getting {topic_lower} right early avoids costly surprises later. \
             Clear information helps you compare options, plan a budget and ask the right questions."
        ))
    ));

    html.push_str(&format!(
        "<h2>How {} approaches {}</h2>\n",
        html_escape(company),
        html_escape(&topic_lower)
    ));
    if profile.services.is_empty() {
        html.push_str(&format!(
            "<p>{}</p>\n",
            html_escape(&format!(
                "{company} starts with an assessment, explains the options and follows up once the work is done."
            ))
        ));
    } else {
        html.push_str("<ul>\n");
        for service in &profile.services {
            html.push_str(&format!("<li>{}</li>\n", html_escape(service)));
        }
        html.push_str("</ul>\n");
    }

    if !images.is_empty() {
        html.push_str("<h2>Gallery</h2>\n<div class=\"llmgeo-gallery\">\n");
        for image in &images {
            html.push_str(&render_figure(image));
            html.push('\n');
        }
        html.push_str("</div>\n");
    }

    html.push_str(&faq_block(&faq_entries(profile, &topic_lower)));
    html.push_str(&format!(
        "<p class=\"llmgeo-attribution\">{}</p>\n",
        html_escape(&attribution(profile))
    ));

    GeneratedContent {
        title,
        excerpt,
        content_html: html,
        meta: Some(json!({
            "builder": "template",
            "topic_key": request.topic_key,
            "language": profile.language_or_default(),
        })),
        images,
    }
}

fn intro(profile: &SiteProfile, topic: &str) -> String {
    let company = profile.display_name();
    let mut text = format!("This guide explains {topic} the way {company} explains it to customers");
    if !profile.audience.trim().is_empty() {
        text.push_str(&format!(", with {} in mind", profile.audience.trim()));
    }
    text.push('.');
    if !profile.description.trim().is_empty() {
        text.push(' ');
        text.push_str(profile.description.trim());
    }
    text
}

fn faq_entries(profile: &SiteProfile, topic: &str) -> Vec<(String, String)> {
    let company = profile.display_name();
    let mut entries = vec![(
        format!("When should I think about {topic}?"),
        format!("As soon as you notice a need or are planning work. {company} can help you decide."),
    )];

    let area = profile.service_area.trim();
    if !area.is_empty() {
        entries.push((
            format!("Does {company} work in {area}?"),
            format!("Yes, {company} serves customers in {area}."),
        ));
    }

    let contact = match (profile.phone.trim(), profile.contact_url.trim()) {
        ("", "") => "Use the contact page of this website.".to_string(),
        (phone, "") => format!("Call {phone}."),
        ("", url) => format!("Use the contact form at {url}."),
        (phone, url) => format!("Call {phone} or use the contact form at {url}."),
    };
    entries.push((format!("How do I contact {company}?"), contact));
    entries
}

fn faq_block(entries: &[(String, String)]) -> String {
    let mut html = String::from("<h2>Frequently asked questions</h2>\n<div class=\"llmgeo-faq\">\n");
    for (question, answer) in entries {
        html.push_str(&format!(
            "<h3>{}</h3>\n<p>{}</p>\n",
            html_escape(question),
            html_escape(answer)
        ));
    }
    html.push_str("</div>\n");

    let structured = json!({
        "@context": "https://schema.org",
        "@type": "FAQPage",
        "mainEntity": entries
            .iter()
            .map(|(question, answer)| json!({
                "@type": "Question",
                "name": question,
                "acceptedAnswer": {"@type": "Answer", "text": answer},
            }))
            .collect::<Vec<_>>(),
    });
    // `</` would close the script element early.
    let script = structured.to_string().replace("</", "<\\/");
    html.push_str(&format!(
        "<script type=\"application/ld+json\">{script}</script>\n"
    ));
    html
}

fn attribution(profile: &SiteProfile) -> String {
    let company = profile.display_name();
    match profile.service_area.trim() {
        "" => format!("Written by the {company} team."),
        area => format!("Written by the {company} team, serving {area}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SiteProfile {
        SiteProfile {
            company_name: "Acme Roofing".into(),
            service_area: "Lyon".into(),
            audience: "homeowners".into(),
            services: vec!["Roof repair".into(), "Gutter <cleaning>".into()],
            phone: "04 00 00 00 00".into(),
            ..Default::default()
        }
    }

    fn media(n: usize) -> MediaInventory {
        MediaInventory {
            count: n,
            items: (0..n)
                .map(|i| MediaItem {
                    url: format!("https://acme.test/{i}.jpg"),
                    alt: format!("Photo {i}"),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn same_inputs_produce_identical_html() {
        let request = DraftRequest::new("roof-repair", 2);
        let a = build(&profile(), &media(5), &request);
        let b = build(&profile(), &media(5), &request);
        assert_eq!(a, b);
        assert_eq!(a.title, "Roof repair in Lyon: what Acme Roofing wants you to know");
    }

    #[test]
    fn gallery_takes_first_images_in_order() {
        let content = build(&profile(), &media(5), &DraftRequest::new("guide", 2));
        let urls: Vec<&str> = content.images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://acme.test/0.jpg", "https://acme.test/1.jpg"]);
        assert!(content.content_html.contains("llmgeo-gallery"));

        let without = build(&profile(), &media(5), &DraftRequest::new("guide", 0));
        assert!(without.images.is_empty());
        assert!(!without.content_html.contains("llmgeo-gallery"));
    }

    #[test]
    fn faq_includes_structured_data_and_escapes_text() {
        let content = build(&profile(), &media(0), &DraftRequest::new("guide", 1));
        let html = &content.content_html;
        assert!(html.contains("<script type=\"application/ld+json\">"));
        assert!(html.contains("\"@type\":\"FAQPage\""));
        assert!(html.contains("Gutter &lt;cleaning&gt;"));
        assert!(html.contains("Does Acme Roofing work in Lyon?"));
        assert!(html.contains("llmgeo-attribution"));
    }

    #[test]
    fn empty_profile_still_builds() {
        let content = build(&SiteProfile::default(), &MediaInventory::default(), &DraftRequest::new("guide", 3));
        assert!(content.title.contains("our team"));
        assert!(content.content_html.contains("<h1>"));
    }
}
