use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::config::SiteConfig;
use crate::db::{blog_posts, models::BlogPost};
use crate::error::ApiError;
use crate::state::AppState;

const FEED_LIMIT: i64 = 50;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn rfc822(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

fn render_feed(site: &SiteConfig, posts: &[BlogPost]) -> String {
    let mut items = String::new();
    for post in posts {
        let post_url = format!("{}/blog/{}", site.url, post.slug);
        let desc = post
            .excerpt
            .as_deref()
            .or(post.meta_description.as_deref())
            .unwrap_or("");
        let published = post.published_at.unwrap_or(post.created_at);
        items.push_str(&format!(
            "    <item>\n\
                   <title>{}</title>\n\
                   <link>{}</link>\n\
                   <description>{}</description>\n\
                   <pubDate>{}</pubDate>\n\
                   <guid isPermaLink=\"true\">{}</guid>\n\
                 </item>\n",
            escape_xml(&post.title),
            escape_xml(&post_url),
            escape_xml(desc),
            rfc822(&published),
            escape_xml(&post_url),
        ));
    }

    let feed_url = format!("{}/api/blog/rss.xml", site.url);
    let blog_url = format!("{}/blog", site.url);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{}</title>
    <link>{}</link>
    <description>{}</description>
    <language>en-us</language>
    <atom:link href="{}" rel="self" type="application/rss+xml"/>
    <lastBuildDate>{}</lastBuildDate>
{}  </channel>
</rss>"#,
        escape_xml(&site.title),
        escape_xml(&blog_url),
        escape_xml(&site.description),
        escape_xml(&feed_url),
        posts
            .first()
            .and_then(|p| p.published_at)
            .map(|dt| rfc822(&dt))
            .unwrap_or_default(),
        items,
    )
}

/// GET /api/blog/rss.xml
pub async fn rss_feed(State(state): State<AppState>) -> Result<Response, ApiError> {
    let posts = blog_posts::published_feed(state.db()?, FEED_LIMIT).await?;
    let xml = render_feed(&state.config.site, &posts);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/rss+xml; charset=utf-8"),
            (
                header::CACHE_CONTROL,
                "public, max-age=3600, stale-while-revalidate=600",
            ),
        ],
        xml,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(title: &str, slug: &str) -> BlogPost {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        BlogPost {
            id: 1,
            slug: slug.to_string(),
            title: title.to_string(),
            excerpt: Some("Short & sweet".to_string()),
            meta_description: None,
            hero_image: None,
            social_image: None,
            read_time: 1,
            word_count: 10,
            views: 0,
            published_at: Some(at),
            author: None,
            category_id: None,
            series_id: None,
            series_part: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("<title>"), "&lt;title&gt;");
        assert_eq!(escape_xml("\"quote\""), "&quot;quote&quot;");
    }

    #[test]
    fn test_rfc822_format() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(rfc822(&dt), "Mon, 15 Jan 2024 12:00:00 +0000");
    }

    #[test]
    fn test_render_feed_lists_posts() {
        let site = SiteConfig {
            url: "https://portfolio.example".to_string(),
            title: "Blog".to_string(),
            description: "Posts".to_string(),
        };
        let xml = render_feed(&site, &[post("Hello <World>", "hello-world")]);
        assert!(xml.contains("<title>Hello &lt;World&gt;</title>"));
        assert!(xml.contains("https://portfolio.example/blog/hello-world"));
        assert!(xml.contains("Short &amp; sweet"));
        assert!(xml.contains("<lastBuildDate>Mon, 15 Jan 2024"));
    }
}
