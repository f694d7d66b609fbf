//! Scripted provider adapter for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDate, TimeZone, Utc};

use quorum_core::{
    CalendarEvent, EventChange, EventPayload, Meeting, ProviderKind, QueryWindow, Respondent,
};
use quorum_providers::{
    AuthParams, BoxFuture, EventPage, IdClaims, ProviderAdapter, ProviderError, ProviderResult,
    RefreshedTokens, TokenGrant,
};

/// An adapter that replays scripted responses and records its calls.
///
/// Queues are consumed front to back; an empty queue yields a benign
/// default (empty page, generated event id, Ok).
pub(crate) struct FakeAdapter {
    kind: ProviderKind,
    pub exchanges: Mutex<VecDeque<ProviderResult<TokenGrant>>>,
    pub refreshes: Mutex<VecDeque<ProviderResult<RefreshedTokens>>>,
    pub pages: Mutex<VecDeque<ProviderResult<EventPage>>>,
    pub creates: Mutex<VecDeque<ProviderResult<String>>>,
    pub updates: Mutex<VecDeque<ProviderResult<()>>>,
    pub deletes: Mutex<VecDeque<ProviderResult<()>>>,
    server_nonce: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
    next_event_id: AtomicU64,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::with_kind(ProviderKind::Google)
    }

    pub fn with_kind(kind: ProviderKind) -> Self {
        Self {
            kind,
            exchanges: Mutex::new(VecDeque::new()),
            refreshes: Mutex::new(VecDeque::new()),
            pages: Mutex::new(VecDeque::new()),
            creates: Mutex::new(VecDeque::new()),
            updates: Mutex::new(VecDeque::new()),
            deletes: Mutex::new(VecDeque::new()),
            server_nonce: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            next_event_id: AtomicU64::new(1),
        }
    }

    pub fn set_server_nonce(&self, nonce: &str) {
        *self.server_nonce.lock().unwrap() = Some(nonce.to_string());
    }

    pub fn push_exchange(&self, result: ProviderResult<TokenGrant>) {
        self.exchanges.lock().unwrap().push_back(result);
    }

    pub fn push_refresh(&self, result: ProviderResult<RefreshedTokens>) {
        self.refreshes.lock().unwrap().push_back(result);
    }

    pub fn push_page(&self, page: EventPage) {
        self.pages.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_page_err(&self, err: ProviderError) {
        self.pages.lock().unwrap().push_back(Err(err));
    }

    pub fn push_create(&self, result: ProviderResult<String>) {
        self.creates.lock().unwrap().push_back(result);
    }

    pub fn push_update(&self, result: ProviderResult<()>) {
        self.updates.lock().unwrap().push_back(result);
    }

    pub fn push_delete(&self, result: ProviderResult<()>) {
        self.deletes.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ProviderAdapter for FakeAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn scopes(&self) -> &[&'static str] {
        &["openid", "email", "calendar.events"]
    }

    fn calendar_scope(&self) -> &'static str {
        "calendar.events"
    }

    fn auth_params(&self, force_consent: bool) -> ProviderResult<AuthParams> {
        let mut query = vec![("client_id", "fake-client".to_string())];
        if force_consent {
            query.push(("prompt", "consent".to_string()));
        }
        Ok(AuthParams {
            endpoint: format!("https://auth.test/{}/authorize", self.kind),
            query,
            server_nonce: self.server_nonce.lock().unwrap().clone(),
        })
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        server_nonce: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<TokenGrant>> {
        self.record(format!(
            "exchange code={code} nonce={}",
            server_nonce.unwrap_or("none")
        ));
        let result = self
            .exchanges
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::internal("unscripted exchange")));
        Box::pin(async move { result })
    }

    fn refresh_tokens<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<RefreshedTokens>> {
        self.record(format!("refresh token={refresh_token}"));
        let result = self
            .refreshes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::internal("unscripted refresh")));
        Box::pin(async move { result })
    }

    fn list_events<'a>(
        &'a self,
        _access_token: &'a str,
        _window: &'a QueryWindow,
        cursor: Option<&'a str>,
        page: Option<&'a str>,
    ) -> BoxFuture<'a, ProviderResult<EventPage>> {
        self.record(format!(
            "list cursor={} page={}",
            cursor.unwrap_or("none"),
            page.unwrap_or("none")
        ));
        let result = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(EventPage::default()));
        Box::pin(async move { result })
    }

    fn create_event<'a>(
        &'a self,
        _access_token: &'a str,
        payload: &'a EventPayload,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        self.record(format!("create summary={}", payload.summary));
        let result = self.creates.lock().unwrap().pop_front().unwrap_or_else(|| {
            let n = self.next_event_id.fetch_add(1, Ordering::SeqCst);
            Ok(format!("fake-ev-{n}"))
        });
        Box::pin(async move { result })
    }

    fn update_event<'a>(
        &'a self,
        _access_token: &'a str,
        event_id: &'a str,
        _payload: &'a EventPayload,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        self.record(format!("update id={event_id}"));
        let result = self
            .updates
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        Box::pin(async move { result })
    }

    fn delete_event<'a>(
        &'a self,
        _access_token: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        self.record(format!("delete id={event_id}"));
        let result = self
            .deletes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        Box::pin(async move { result })
    }
}

/// Unscheduled fixture meeting: user 4 responded (respondent 31), one
/// guest respondent without an account.
pub(crate) fn meeting(id: i64) -> Meeting {
    Meeting {
        id,
        name: "Planning".to_string(),
        description: "Quarterly planning".to_string(),
        public_url: format!("https://quorum.example/m/{id}"),
        timezone: "Europe/Paris".to_string(),
        from_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        to_date: NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(),
        no_earlier_hour: 9,
        no_later_hour: 18,
        scheduled: None,
        respondents: vec![
            Respondent {
                id: 31,
                user_id: Some(4),
            },
            Respondent {
                id: 32,
                user_id: None,
            },
        ],
    }
}

/// An upsert change on 2024-06-03, one hour long, starting at `hour` UTC.
pub(crate) fn upsert(id: &str, hour: u32) -> EventChange {
    EventChange::Upsert(CalendarEvent::new(
        id,
        format!("busy-{id}"),
        Utc.with_ymd_and_hms(2024, 6, 3, hour, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 6, 3, hour + 1, 0, 0).unwrap(),
    ))
}

/// A token grant carrying the given identity.
pub(crate) fn grant(
    subject: &str,
    email: Option<&str>,
    refresh_token: Option<&str>,
    scope: &str,
) -> TokenGrant {
    TokenGrant {
        access_token: format!("at-{subject}"),
        expires_at: Utc::now().timestamp() + 3600,
        refresh_token: refresh_token.map(String::from),
        scope: scope.to_string(),
        claims: IdClaims {
            subject: subject.to_string(),
            email: email.map(String::from),
            name: Some("Ada Lovelace".to_string()),
        },
    }
}
