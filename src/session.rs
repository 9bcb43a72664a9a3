//! The crawl session: fetch, classify, dispatch, repeat.
//!
//! One page is in flight at a time, mirroring how the archive itself works:
//! navigating away destroys the page, so everything worth keeping is written
//! to the state store before the next fetch. Each page kind has one handler:
//!
//! - **License** — POST the consent form and carry on.
//! - **Breaking news** — jump to the morning edition's listing for today.
//! - **Headline list** — rebuild stale traversal state from the page, select
//!   every headline, and request the article bodies.
//! - **Article body** — scrape, normalize, write the JSON artifact, then ask
//!   the planner where to go next.
//!
//! Handler-level failures (missing forms, empty pages) are soft: the handler
//! logs and the session stops cleanly instead of erroring out.

use crate::classify::{PageKind, classify};
use crate::models::{Article, Edition, TraversalState};
use crate::normalize::normalize_article;
use crate::outputs::json;
use crate::planner::{Plan, is_state_stale, logical_date, plan_next};
use crate::scrape::{self, FormSubmission};
use crate::store::StateStore;
use crate::utils::listing_url;
use chrono::Local;
use scraper::Html;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// One sequential crawl over the archive.
pub struct Session {
    client: reqwest::Client,
    store: StateStore,
    output_dir: String,
    staleness_minutes: i64,
}

/// The next HTTP request a handler wants made, if any.
enum NextRequest {
    Get(String),
    Post(FormSubmission),
}

impl Session {
    pub fn new(
        client: reqwest::Client,
        store: StateStore,
        output_dir: String,
        staleness_minutes: i64,
    ) -> Self {
        Self {
            client,
            store,
            output_dir,
            staleness_minutes,
        }
    }

    /// Crawl until a handler has nowhere further to go.
    #[instrument(level = "info", skip_all, fields(start_url = %start_url))]
    pub async fn run(&self, start_url: &str) -> Result<(), Box<dyn Error>> {
        let mut pending = Some(NextRequest::Get(start_url.to_string()));
        let mut pages = 0usize;
        while let Some(request) = pending.take() {
            let (url, body) = self.fetch(request).await?;
            pages += 1;
            pending = self.dispatch(&url, &body).await?;
        }
        info!(pages, "Session finished");
        Ok(())
    }

    async fn fetch(&self, request: NextRequest) -> Result<(Url, String), Box<dyn Error>> {
        let response = match request {
            NextRequest::Get(url) => {
                info!(%url, "Fetching page");
                self.client.get(&url).send().await?
            }
            NextRequest::Post(form) => {
                info!(url = %form.action, fields = form.fields.len(), "Submitting form");
                self.client
                    .post(&form.action)
                    .form(&form.fields)
                    .send()
                    .await?
            }
        };
        let url = response.url().clone();
        let body = response.text().await?;
        debug!(%url, bytes = body.len(), "Fetched");
        Ok((url, body))
    }

    async fn dispatch(&self, url: &Url, body: &str) -> Result<Option<NextRequest>, Box<dyn Error>> {
        let kind = classify(url.as_str());
        debug!(?kind, %url, "Classified page");
        match kind {
            PageKind::License => Ok(self.on_license_page(url, body)),
            PageKind::BreakingNews => Ok(Some(self.on_breaking_news_page())),
            PageKind::HeadlineList => self.on_headline_page(url, body).await,
            PageKind::ArticleBody => self.on_article_page(body).await,
            PageKind::Unrecognized => {
                warn!(%url, "Unrecognized page; nothing to do here");
                Ok(None)
            }
        }
    }

    fn on_license_page(&self, url: &Url, body: &str) -> Option<NextRequest> {
        let doc = Html::parse_document(body);
        match scrape::consent_form(&doc, url) {
            Some(form) => {
                info!("Accepting the terms-of-use interstitial");
                Some(NextRequest::Post(form))
            }
            None => {
                warn!("Consent form not found on the license page");
                None
            }
        }
    }

    fn on_breaking_news_page(&self) -> NextRequest {
        let target = listing_url(Edition::DEFAULT, Some(logical_date(Local::now())));
        info!(url = %target, "Leaving the breaking-news page for the morning edition");
        NextRequest::Get(target)
    }

    #[instrument(level = "info", skip_all)]
    async fn on_headline_page(
        &self,
        url: &Url,
        body: &str,
    ) -> Result<Option<NextRequest>, Box<dyn Error>> {
        if !self.store.autopilot().await {
            info!("Autopilot is off; leaving the headline page as-is");
            return Ok(None);
        }

        let now = Local::now();
        let today = logical_date(now);
        let (editions, dates, entries, form) = {
            let doc = Html::parse_document(body);
            (
                scrape::available_editions(&doc),
                scrape::remaining_dates(&doc, today),
                scrape::headline_entries(&doc, today),
                scrape::article_body_form(&doc, url),
            )
        };

        let state = self.store.traversal_state().await;
        if is_state_stale(state.timestamp, now, self.staleness_minutes) {
            let refreshed = TraversalState {
                timestamp: now.timestamp_millis(),
                available_editions: editions,
                remaining_dates: dates,
            };
            info!(
                editions = refreshed.available_editions.len(),
                "Traversal state is stale; rebuilding it from this listing page"
            );
            self.store.set_traversal_state(&refreshed).await?;
        }

        if entries.is_empty() {
            info!("No usable headlines here; traversal is finished");
            self.finish().await?;
            return Ok(None);
        }
        info!(count = entries.len(), first = %entries[0].title, "Selecting headlines");

        match form {
            Some(form) => Ok(Some(NextRequest::Post(form))),
            None => {
                warn!("Submit button for article bodies is missing; skipping this page");
                Ok(None)
            }
        }
    }

    #[instrument(level = "info", skip_all)]
    async fn on_article_page(&self, body: &str) -> Result<Option<NextRequest>, Box<dyn Error>> {
        let now = Local::now();
        let today = logical_date(now);
        let (articles, current) = {
            let doc = Html::parse_document(body);
            (
                scrape::collect_articles(&doc, today),
                scrape::current_edition(&doc, PageKind::ArticleBody),
            )
        };
        let articles: Vec<Article> = articles.into_iter().map(normalize_article).collect();

        if articles.is_empty() {
            warn!("Body page held no articles");
        } else if let Err(e) = json::write_articles(&articles, &self.output_dir, today).await {
            // a failed write costs this batch only, never the traversal
            error!(error = %e, "Failed to write the article archive");
        }

        if !self.store.autopilot().await {
            info!("Autopilot is off; stopping after this page");
            return Ok(None);
        }

        let mut state = self.store.traversal_state().await;
        match plan_next(current, &mut state, now) {
            Plan::Visit(target) => {
                self.store.set_traversal_state(&state).await?;
                info!(
                    edition = %target.edition,
                    name = target.edition.label(),
                    date = ?target.date,
                    "Moving on"
                );
                Ok(Some(NextRequest::Get(target.url)))
            }
            Plan::Done => {
                info!("Every edition is exhausted");
                self.finish().await?;
                Ok(None)
            }
        }
    }

    async fn finish(&self) -> Result<(), Box<dyn Error>> {
        self.store.clear_traversal_state().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const ARTICLE_PAGE: &str = r#"<html><body>
<form name="breadcrumbsForm" action="/g3/p03/LATCB012.do">
  <input type="hidden" name="mediaCode" value="NKM">
</form>
<h2 class="title">新社長就任（人事）</h2>
<p class="text atc_txt01">2024/01/05 日本経済新聞 朝刊 3ページ 1234文字</p>
<div class="Honbun"><div class="col10">新社長が就任した。<br>【注】役員データ調べ</div></div>
</body></html>"#;

    const LICENSE_PAGE: &str = r#"<html><body>
<form name="InfoJpNikkeiTelecomForm" action="/g3/p03/SSMMTOP1.do" method="post">
  <input type="hidden" name="agreement" value="yes">
</form>
</body></html>"#;

    const HEADLINE_PAGE: &str = r##"<html><body>
<div id="subcategory">
  <ul class="menuFolderList">
    <li><a class="current" href="/g3/p03/LATCB012.do?mediaCode=NKM&amp;date=20240106">1/6</a></li>
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NKM&amp;date=20240105">1/5</a></li>
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NKM&amp;date=20240104">1/4</a></li>
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NSS&amp;date=20240105">1/5</a></li>
  </ul>
</div>
<div id="subcategory2">
  <ul class="menuFolderList">
    <li><a href="/g3/p03/LATCB012.do?mediaCode=NSS">日経産業新聞</a></li>
    <li><a class="current" href="/g3/p03/LATCB012.do?mediaCode=NKM">日経朝刊</a></li>
  </ul>
</div>
<form action="/g3/p03/LATCB014.do" method="post">
  <input type="hidden" name="transitionId" value="abc123">
  <ul>
    <li class="headlineTwoToneA">
      <input type="checkbox" name="kijiId" value="K001">
      <div class="col"><p><a href="#">新社長就任（人事）</a></p></div>
      <ul class="AttInfo"><li class="AttInfoBody">2024/01/05 日本経済新聞 朝刊 3ページ 1234文字</li></ul>
    </li>
  </ul>
  <input type="submit" name="show" value="本文を表示">
</form>
</body></html>"##;

    fn session(dir: &TempDir) -> Session {
        Session::new(
            reqwest::Client::new(),
            StateStore::new(dir.path().join("state.json")),
            dir.path().join("out").to_str().unwrap().to_string(),
            1,
        )
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_breaking_news_redirects_to_morning_edition() {
        let dir = TempDir::new().unwrap();
        let url = Url::parse("https://t21.nikkei.co.jp/g3/p03/LATCA011.do").unwrap();

        let next = session(&dir).dispatch(&url, "<html></html>").await.unwrap();

        let Some(NextRequest::Get(target)) = next else {
            panic!("expected a GET");
        };
        assert!(target.contains("mediaCode=NKM"));
        assert!(target.contains("date="));
    }

    #[tokio::test]
    async fn test_unrecognized_page_stops() {
        let dir = TempDir::new().unwrap();
        let url = Url::parse("https://t21.nikkei.co.jp/g3/top.do").unwrap();

        let next = session(&dir).dispatch(&url, "<html></html>").await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_license_page_submits_consent() {
        let dir = TempDir::new().unwrap();
        let url = Url::parse("https://t21.nikkei.co.jp/g3/info_jp_nikkei_telecom.do").unwrap();

        let next = session(&dir).dispatch(&url, LICENSE_PAGE).await.unwrap();

        let Some(NextRequest::Post(form)) = next else {
            panic!("expected a POST");
        };
        assert_eq!(form.action, "https://t21.nikkei.co.jp/g3/p03/SSMMTOP1.do");
        assert_eq!(form.fields, vec![("agreement".into(), "yes".into())]);
    }

    #[tokio::test]
    async fn test_headline_page_noop_without_autopilot() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        session.store.set_autopilot(false).await.unwrap();
        let url =
            Url::parse("https://t21.nikkei.co.jp/g3/p03/LATCB012.do?mediaCode=NKM").unwrap();

        let next = session.dispatch(&url, "<html></html>").await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_headline_page_rebuilds_stale_state_and_requests_bodies() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let url =
            Url::parse("https://t21.nikkei.co.jp/g3/p03/LATCB012.do?mediaCode=NKM").unwrap();

        // empty store: timestamp 0 is always stale, so the state is rebuilt
        let next = session.dispatch(&url, HEADLINE_PAGE).await.unwrap();

        let Some(NextRequest::Post(form)) = next else {
            panic!("expected a POST for the article bodies");
        };
        assert_eq!(form.action, "https://t21.nikkei.co.jp/g3/p03/LATCB014.do");
        assert!(form.fields.contains(&("kijiId".into(), "K001".into())));

        let state = session.store.traversal_state().await;
        assert!(state.timestamp > 0);
        assert_eq!(state.available_editions, vec![Edition::Nkm, Edition::Nss]);
        assert_eq!(state.remaining_dates[&Edition::Nkm].len(), 2);
        assert_eq!(state.remaining_dates[&Edition::Nss].len(), 1);
    }

    #[tokio::test]
    async fn test_headline_page_keeps_fresh_state() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        let fresh = TraversalState {
            timestamp: Local::now().timestamp_millis(),
            available_editions: vec![Edition::Nkl],
            remaining_dates: BTreeMap::new(),
        };
        session.store.set_traversal_state(&fresh).await.unwrap();

        let url =
            Url::parse("https://t21.nikkei.co.jp/g3/p03/LATCB012.do?mediaCode=NKM").unwrap();
        let next = session.dispatch(&url, HEADLINE_PAGE).await.unwrap();

        // the bodies are still requested, but the fresh state is left alone
        assert!(matches!(next, Some(NextRequest::Post(_))));
        assert_eq!(session.store.traversal_state().await, fresh);
    }

    #[tokio::test]
    async fn test_article_page_writes_artifact_and_stops_without_autopilot() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        tokio::fs::create_dir_all(dir.path().join("out")).await.unwrap();
        session.store.set_autopilot(false).await.unwrap();
        let url = Url::parse("https://t21.nikkei.co.jp/g3/p03/LATCB014.do").unwrap();

        let next = session.dispatch(&url, ARTICLE_PAGE).await.unwrap();
        assert!(next.is_none());

        let written = dir
            .path()
            .join("out")
            .join("Nikkei_2024-01-05_日本経済新聞 朝刊.json");
        let body = tokio::fs::read_to_string(written).await.unwrap();
        let articles: Vec<Article> = serde_json::from_str(&body).unwrap();
        assert_eq!(articles.len(), 1);
        // the artifact holds normalized text
        assert_eq!(
            articles[0].text,
            "## 新社長が就任した。\n\n> 【注】役員データ調べ"
        );
    }

    #[tokio::test]
    async fn test_article_page_follows_planner_with_autopilot() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        tokio::fs::create_dir_all(dir.path().join("out")).await.unwrap();

        let mut remaining = BTreeMap::new();
        remaining.insert(Edition::Nkm, vec![day(2024, 1, 4)]);
        session
            .store
            .set_traversal_state(&TraversalState {
                timestamp: Local::now().timestamp_millis(),
                available_editions: vec![Edition::Nkm],
                remaining_dates: remaining,
            })
            .await
            .unwrap();

        let url = Url::parse("https://t21.nikkei.co.jp/g3/p03/LATCB014.do").unwrap();
        let next = session.dispatch(&url, ARTICLE_PAGE).await.unwrap();

        let Some(NextRequest::Get(target)) = next else {
            panic!("expected a GET");
        };
        assert!(target.contains("mediaCode=NKM"));
        assert!(target.contains("date=20240104"));
        // the consumed date is gone from the store
        let state = session.store.traversal_state().await;
        assert!(state.remaining_dates[&Edition::Nkm].is_empty());
    }

    #[tokio::test]
    async fn test_article_page_clears_state_when_done() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        tokio::fs::create_dir_all(dir.path().join("out")).await.unwrap();

        session
            .store
            .set_traversal_state(&TraversalState {
                timestamp: Local::now().timestamp_millis(),
                available_editions: vec![Edition::Nkm],
                remaining_dates: BTreeMap::new(),
            })
            .await
            .unwrap();

        let url = Url::parse("https://t21.nikkei.co.jp/g3/p03/LATCB014.do").unwrap();
        let next = session.dispatch(&url, ARTICLE_PAGE).await.unwrap();

        assert!(next.is_none());
        let state = session.store.traversal_state().await;
        assert!(state.available_editions.is_empty());
        assert!(state.remaining_dates.is_empty());
    }
}
