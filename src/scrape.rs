//! HTML extraction for the archive's page layouts.
//!
//! Everything the rest of the application knows about a page comes through
//! here as plain strings and typed values; no DOM handles escape this module.
//! Selectors follow the archive's fixed markup:
//!
//! - `#subcategory` — the date menu for the current edition
//! - `#subcategory2` — the edition menu
//! - `li.headlineTwoToneA` — one selectable headline row
//! - `h2.title` / `.text.atc_txt01` / `.Honbun .col10` — title, metadata
//!   line, and body of one article on the body page
//!
//! Missing elements and malformed metadata are soft failures: the affected
//! value degrades to `None`/zero/empty and the caller carries on.

use crate::classify::{PageKind, edition_from_url};
use crate::models::{Article, Edition};
use crate::utils::{parse_date_string, truncate_for_log};
use chrono::NaiveDate;
use itertools::{Itertools, izip};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;

/// One selectable headline row on the listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlineEntry {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub newspaper: String,
    pub page: u32,
    pub chars: u32,
}

/// An HTML form ready to be POSTed: resolved action URL plus field pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSubmission {
    pub action: String,
    pub fields: Vec<(String, String)>,
}

/// Supported editions present in the listing page's edition menu.
///
/// Returned in canonical [`Edition::ALL`] order regardless of menu order;
/// unsupported codes in the menu are dropped.
pub fn available_editions(doc: &Html) -> Vec<Edition> {
    let menu = Selector::parse("#subcategory2 .menuFolderList a").unwrap();
    let on_page: Vec<Edition> = doc
        .select(&menu)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(edition_from_url)
        .collect();
    Edition::ALL
        .into_iter()
        .filter(|edition| on_page.contains(edition))
        .collect()
}

/// Dates still listed in the date menu, per edition, excluding the date
/// currently shown.
///
/// Menu labels are `M/d` without a year; the year is taken from `today`.
/// Duplicate labels (the menu repeats dates across sections) collapse to
/// their first occurrence.
pub fn remaining_dates(doc: &Html, today: NaiveDate) -> BTreeMap<Edition, Vec<NaiveDate>> {
    let other_days = Selector::parse("#subcategory .menuFolderList a:not(.current)").unwrap();
    let mut dates: BTreeMap<Edition, Vec<NaiveDate>> = BTreeMap::new();
    for link in doc.select(&other_days) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(edition) = edition_from_url(href) else {
            continue;
        };
        let label = link.text().collect::<String>();
        let Some(date) = parse_date_string(label.trim(), today) else {
            debug!(label = %label.trim(), "Skipping date link with unparseable label");
            continue;
        };
        dates.entry(edition).or_default().push(date);
    }
    dates
        .into_iter()
        .map(|(edition, list)| (edition, list.into_iter().unique().collect()))
        .collect()
}

/// The edition the rendered page belongs to, or `None` when it cannot be
/// recognized (callers treat that as "unknown edition", not as an error).
pub fn current_edition(doc: &Html, kind: PageKind) -> Option<Edition> {
    match kind {
        PageKind::HeadlineList => {
            let current = Selector::parse("#subcategory2 .menuFolderList a.current").unwrap();
            doc.select(&current)
                .next()
                .and_then(|link| link.value().attr("href"))
                .and_then(edition_from_url)
        }
        PageKind::ArticleBody => {
            let media_input = Selector::parse(r#"input[name="mediaCode"]"#).unwrap();
            doc.select(&media_input)
                .next()
                .and_then(|input| input.value().attr("value"))
                .and_then(Edition::from_code)
        }
        _ => None,
    }
}

/// Headline rows with a selectable title link, paired with their metadata.
pub fn headline_entries(doc: &Html, today: NaiveDate) -> Vec<HeadlineEntry> {
    let row = Selector::parse("li.headlineTwoToneA").unwrap();
    let title_link = Selector::parse("div.col p a").unwrap();
    let meta_line = Selector::parse("li.AttInfoBody").unwrap();

    doc.select(&row)
        .filter_map(|item| {
            let title = item
                .select(&title_link)
                .next()?
                .text()
                .collect::<String>()
                .trim()
                .to_string();
            let meta = item
                .select(&meta_line)
                .next()
                .map(|el| el.text().collect::<String>())
                .unwrap_or_default();
            let meta = parse_meta_line(&meta, today);
            Some(HeadlineEntry {
                title,
                date: meta.date,
                newspaper: meta.newspaper,
                page: meta.page,
                chars: meta.chars,
            })
        })
        .collect()
}

/// Scrape every article on a body page as (title, metadata, body) tuples.
///
/// Bodies are taken as inner HTML so the site's `<br>` line-break tokens
/// survive for the normalizer. Sections are zipped positionally; a page
/// whose sections do not line up yields the common prefix with a warning.
pub fn collect_articles(doc: &Html, today: NaiveDate) -> Vec<Article> {
    let title_sel = Selector::parse("h2.title").unwrap();
    let meta_sel = Selector::parse(".text.atc_txt01").unwrap();
    let body_sel = Selector::parse(".Honbun .col10").unwrap();

    let titles: Vec<String> = doc
        .select(&title_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();
    let metas: Vec<MetaLine> = doc
        .select(&meta_sel)
        .map(|el| parse_meta_line(&el.text().collect::<String>(), today))
        .collect();
    let bodies: Vec<String> = doc
        .select(&body_sel)
        .map(|el| el.inner_html().trim().to_string())
        .collect();

    if titles.len() != metas.len() || titles.len() != bodies.len() {
        warn!(
            titles = titles.len(),
            metas = metas.len(),
            bodies = bodies.len(),
            "Body page sections do not line up; zipping to the shortest"
        );
    }

    izip!(titles, metas, bodies)
        .map(|(title, meta, text)| {
            debug!(title = %truncate_for_log(&title, 60), "Collected article");
            let genre = genre_of(&title);
            Article {
                title,
                text,
                date: meta.date,
                newspaper: meta.newspaper,
                page: meta.page,
                chars: meta.chars,
                genre,
                has_image: meta.has_image,
                has_pdf: meta.has_pdf,
            }
        })
        .collect()
}

/// The terms-of-use consent form, ready to submit.
pub fn consent_form(doc: &Html, base: &Url) -> Option<FormSubmission> {
    let form_sel = Selector::parse(r#"form[name="InfoJpNikkeiTelecomForm"]"#).unwrap();
    let form = doc.select(&form_sel).next()?;
    Some(FormSubmission {
        action: form_action(form, base),
        fields: hidden_fields(form),
    })
}

/// The "show article bodies" submission for a headline page, with every
/// headline checkbox selected.
///
/// Returns `None` when the submit button (or its form) is missing, which the
/// caller treats as a soft failure.
pub fn article_body_form(doc: &Html, base: &Url) -> Option<FormSubmission> {
    let submit_sel = Selector::parse(r#"input[value="本文を表示"]"#).unwrap();
    let checkbox_sel = Selector::parse(r#"input[type="checkbox"]"#).unwrap();

    let submit = doc.select(&submit_sel).next()?;
    let form = enclosing_form(submit)?;

    let mut fields = hidden_fields(form);
    for checkbox in form.select(&checkbox_sel) {
        let Some(name) = checkbox.value().attr("name") else {
            continue;
        };
        let value = checkbox.value().attr("value").unwrap_or("on");
        fields.push((name.to_string(), value.to_string()));
    }
    if let (Some(name), Some(value)) = (submit.value().attr("name"), submit.value().attr("value")) {
        fields.push((name.to_string(), value.to_string()));
    }

    Some(FormSubmission {
        action: form_action(form, base),
        fields,
    })
}

static GENRE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new("（([^（）]+)）$").unwrap());

/// Category label carried as a trailing （…） marker in a headline, if any.
pub fn genre_of(title: &str) -> Option<String> {
    GENRE_SUFFIX
        .captures(title)
        .map(|caps| caps[1].to_string())
}

#[derive(Debug, Default)]
struct MetaLine {
    date: Option<NaiveDate>,
    newspaper: String,
    page: u32,
    chars: u32,
    has_image: bool,
    has_pdf: bool,
}

static PAGE_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)ページ").unwrap());
static CHAR_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)文字").unwrap());

/// Parse a metadata line like
/// `2024/01/05 日本経済新聞 朝刊 3ページ 1234文字 画像有`.
///
/// Every piece degrades independently when missing or malformed.
fn parse_meta_line(text: &str, today: NaiveDate) -> MetaLine {
    let parts: Vec<&str> = text.split_whitespace().collect();

    let date = parts.first().and_then(|t| parse_date_string(t, today));
    let newspaper = match (
        parts.get(1),
        parts
            .get(2)
            .filter(|t| !t.contains("ページ") && !t.contains("文字")),
    ) {
        (Some(name), Some(suffix)) => format!("{name} {suffix}"),
        (Some(name), None) => (*name).to_string(),
        _ => String::new(),
    };

    MetaLine {
        date,
        newspaper,
        page: PAGE_MARK
            .captures(text)
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0),
        chars: CHAR_MARK
            .captures(text)
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0),
        has_image: text.contains("画像"),
        has_pdf: text.contains("PDF"),
    }
}

fn enclosing_form<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "form")
}

fn form_action(form: ElementRef<'_>, base: &Url) -> String {
    form.value()
        .attr("action")
        .and_then(|action| base.join(action).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| base.to_string())
}

fn hidden_fields(form: ElementRef<'_>) -> Vec<(String, String)> {
    let hidden = Selector::parse(r#"input[type="hidden"]"#).unwrap();
    form.select(&hidden)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://t21.nikkei.co.jp/g3/p03/LATCB012.do?mediaCode=NKM").unwrap()
    }

    const HEADLINE_PAGE: &str = r##"<html><body>
<div id="subcategory">
  <ul class="menuFolderList">
    <li><a class="current" href="/g3/p03/LATCB012.do?mediaCode=NKM&amp;date=20240106">1/6</a></li>
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NKM&amp;date=20240105">1/5</a></li>
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NKM&amp;date=20240105">1/5</a></li>
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NKM&amp;date=20240104">1/4</a></li>
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NSS&amp;date=20240105">1/5</a></li>
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NKM">本日</a></li>
  </ul>
</div>
<div id="subcategory2">
  <ul class="menuFolderList">
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NSS">日経産業新聞</a></li>
    <li><a class="current" href="/g3/p03/LATCB012.do?mediaCode=NKM">日経朝刊</a></li>
    <li><a href="/g3/p03/LATCB012.do?mediaCode=XXX">未対応の媒体</a></li>
  </ul>
</div>
<form action="/g3/p03/LATCB014.do" method="post">
  <input type="hidden" name="transitionId" value="abc123">
  <ul>
    <li class="headlineTwoToneA">
      <input type="checkbox" name="kijiId" value="K001">
      <div class="col"><p><a href="#">新社長就任（人事）</a></p></div>
      <ul class="AttInfo"><li class="AttInfoBody">2024/01/05 日本経済新聞 朝刊 3ページ 1234文字 画像有</li></ul>
    </li>
    <li class="headlineTwoToneA">
      <input type="checkbox" name="kijiId" value="K002">
      <div class="col"><p><a href="#">３・４月の景気見通し</a></p></div>
      <ul class="AttInfo"><li class="AttInfoBody">2024/01/05 日本経済新聞 朝刊 5ページ 800文字 PDF有</li></ul>
    </li>
    <li class="headlineTwoToneA">
      <div class="col"><p>リンクのない行</p></div>
    </li>
  </ul>
  <input type="submit" name="show" value="本文を表示">
</form>
</body></html>"##;

    const ARTICLE_PAGE: &str = r#"<html><body>
<form name="breadcrumbsForm" action="/g3/p03/LATCB012.do">
  <input type="hidden" name="mediaCode" value="NKM">
</form>
<h2 class="title">新社長就任（人事）</h2>
<p class="text atc_txt01">2024/01/05 日本経済新聞 朝刊 3ページ 1234文字 画像有</p>
<div class="Honbun"><div class="col10">　新社長が就任した。<br>【注】役員データ調べ</div></div>
<h2 class="title">３・４月の景気見通し</h2>
<p class="text atc_txt01">2024/01/05 日本経済新聞 朝刊 5ページ 800文字</p>
<div class="Honbun"><div class="col10">景気は緩やかに回復している。</div></div>
</body></html>"#;

    const LICENSE_PAGE: &str = r#"<html><body>
<form name="InfoJpNikkeiTelecomForm" action="/g3/p03/SSMMTOP1.do" method="post">
  <input type="hidden" name="agreement" value="yes">
  <input type="hidden" name="transitionId" value="xyz789">
</form>
</body></html>"#;

    #[test]
    fn test_available_editions_canonical_order() {
        let doc = Html::parse_document(HEADLINE_PAGE);
        // the menu lists NSS first and an unsupported code last; the result
        // is filtered to supported codes in canonical order
        assert_eq!(
            available_editions(&doc),
            vec![Edition::Nkm, Edition::Nss]
        );
    }

    #[test]
    fn test_available_editions_empty_page() {
        let doc = Html::parse_document("<html><body></body></html>");
        assert!(available_editions(&doc).is_empty());
    }

    #[test]
    fn test_remaining_dates_dedupes_and_skips_current() {
        let doc = Html::parse_document(HEADLINE_PAGE);
        let dates = remaining_dates(&doc, day(2024, 6, 1));

        assert_eq!(
            dates[&Edition::Nkm],
            vec![day(2024, 1, 5), day(2024, 1, 4)]
        );
        assert_eq!(dates[&Edition::Nss], vec![day(2024, 1, 5)]);
    }

    #[test]
    fn test_current_edition_on_headline_page() {
        let doc = Html::parse_document(HEADLINE_PAGE);
        assert_eq!(
            current_edition(&doc, PageKind::HeadlineList),
            Some(Edition::Nkm)
        );
    }

    #[test]
    fn test_current_edition_on_article_page() {
        let doc = Html::parse_document(ARTICLE_PAGE);
        assert_eq!(
            current_edition(&doc, PageKind::ArticleBody),
            Some(Edition::Nkm)
        );
    }

    #[test]
    fn test_current_edition_unrecognized_elsewhere() {
        let doc = Html::parse_document(HEADLINE_PAGE);
        assert_eq!(current_edition(&doc, PageKind::BreakingNews), None);
    }

    #[test]
    fn test_headline_entries_skip_rows_without_links() {
        let doc = Html::parse_document(HEADLINE_PAGE);
        let entries = headline_entries(&doc, day(2024, 6, 1));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "新社長就任（人事）");
        assert_eq!(entries[0].date, Some(day(2024, 1, 5)));
        assert_eq!(entries[0].newspaper, "日本経済新聞 朝刊");
        assert_eq!(entries[0].page, 3);
        assert_eq!(entries[0].chars, 1234);
        assert_eq!(entries[1].chars, 800);
    }

    #[test]
    fn test_article_body_form_selects_every_headline() {
        let doc = Html::parse_document(HEADLINE_PAGE);
        let form = article_body_form(&doc, &base()).unwrap();

        assert_eq!(form.action, "https://t21.nikkei.co.jp/g3/p03/LATCB014.do");
        assert!(form.fields.contains(&("transitionId".into(), "abc123".into())));
        assert!(form.fields.contains(&("kijiId".into(), "K001".into())));
        assert!(form.fields.contains(&("kijiId".into(), "K002".into())));
        assert!(form.fields.contains(&("show".into(), "本文を表示".into())));
    }

    #[test]
    fn test_article_body_form_missing_submit_is_none() {
        let doc = Html::parse_document(ARTICLE_PAGE);
        assert_eq!(article_body_form(&doc, &base()), None);
    }

    #[test]
    fn test_consent_form() {
        let doc = Html::parse_document(LICENSE_PAGE);
        let form = consent_form(&doc, &base()).unwrap();

        assert_eq!(form.action, "https://t21.nikkei.co.jp/g3/p03/SSMMTOP1.do");
        assert_eq!(
            form.fields,
            vec![
                ("agreement".to_string(), "yes".to_string()),
                ("transitionId".to_string(), "xyz789".to_string()),
            ]
        );
    }

    #[test]
    fn test_consent_form_absent_is_none() {
        let doc = Html::parse_document(HEADLINE_PAGE);
        assert_eq!(consent_form(&doc, &base()), None);
    }

    #[test]
    fn test_collect_articles_keeps_line_break_tokens() {
        let doc = Html::parse_document(ARTICLE_PAGE);
        let articles = collect_articles(&doc, day(2024, 6, 1));

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "新社長就任（人事）");
        assert_eq!(articles[0].genre.as_deref(), Some("人事"));
        assert_eq!(articles[0].date, Some(day(2024, 1, 5)));
        assert_eq!(articles[0].newspaper, "日本経済新聞 朝刊");
        assert_eq!(articles[0].page, 3);
        assert_eq!(articles[0].chars, 1234);
        assert!(articles[0].has_image);
        assert!(!articles[0].has_pdf);
        // trim() eats the leading ideographic indent, as the original DOM
        // text extraction always has; the <br> token must survive
        assert_eq!(articles[0].text, "新社長が就任した。<br>【注】役員データ調べ");

        assert_eq!(articles[1].genre, None);
        assert!(!articles[1].has_image);
    }

    #[test]
    fn test_collect_articles_empty_page() {
        let doc = Html::parse_document("<html><body></body></html>");
        assert!(collect_articles(&doc, day(2024, 6, 1)).is_empty());
    }

    #[test]
    fn test_parse_meta_line_degrades_gracefully() {
        let meta = parse_meta_line("", day(2024, 6, 1));
        assert_eq!(meta.date, None);
        assert_eq!(meta.newspaper, "");
        assert_eq!(meta.page, 0);
        assert_eq!(meta.chars, 0);
        assert!(!meta.has_image);
        assert!(!meta.has_pdf);
    }

    #[test]
    fn test_parse_meta_line_single_name_token() {
        let meta = parse_meta_line("2024/01/05 日経産業新聞 9ページ 500文字", day(2024, 6, 1));
        assert_eq!(meta.newspaper, "日経産業新聞");
        assert_eq!(meta.page, 9);
        assert_eq!(meta.chars, 500);
    }

    #[test]
    fn test_genre_of() {
        assert_eq!(genre_of("新社長就任（人事）").as_deref(), Some("人事"));
        assert_eq!(genre_of("（格付け）記事のタイトル"), None);
        assert_eq!(genre_of("普通のタイトル"), None);
    }
}
