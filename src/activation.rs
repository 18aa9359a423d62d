//! Account activation from an emailed link carrying `uid` and `token`.

use base64::{Engine, prelude::BASE64_STANDARD};
use build_html::{Html, HtmlContainer, HtmlElement, HtmlPage, HtmlTag, escape_html};
use derive_more::Display;
use serde_json::Value;
use url::Url;

use crate::{
    api::{ApiClient, FailureKind, Outcome},
    config::{self, MessageTemplate},
};

const DEFAULT_SUCCESS_MESSAGE: &str = "Account successfully activated!";
const DEFAULT_REJECTION_MESSAGE: &str = "Activation failed";

const CHECK_ICON: &str = include_str!("icons/check.svg");
const ERROR_ICON: &str = include_str!("icons/error.svg");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationParams {
    pub uid: String,
    pub token: String,
}

impl ActivationParams {
    /// Both `uid` and `token` must be present and non-empty.
    pub fn from_url(url: &Url) -> Option<Self> {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };
        Some(Self {
            uid: param("uid")?,
            token: param("token")?,
        })
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStatus {
    #[display("processing")]
    Processing,
    #[display("success")]
    Success,
    #[display("error")]
    Error,
}

impl ActivationStatus {
    fn template(self) -> MessageTemplate {
        match self {
            Self::Processing => config::ACTIVATION_PROCESSING,
            Self::Success => config::ACTIVATION_SUCCESS,
            Self::Error => config::ACTIVATION_ERROR,
        }
    }

    fn title_class(self) -> &'static str {
        match self {
            Self::Processing => "font_prime_color",
            Self::Success => "activation-success-text",
            Self::Error => "font_error_color",
        }
    }

    fn redirect_notice(self) -> Option<&'static str> {
        match self {
            Self::Processing => None,
            Self::Success => Some("Redirecting to login..."),
            Self::Error => Some("Redirecting to homepage..."),
        }
    }
}

/// What the activation page shows for one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationView {
    pub status: ActivationStatus,
    pub icon: Option<&'static str>,
    pub title: &'static str,
    pub text: String,
}

impl ActivationView {
    /// A non-empty `message` replaces the template's text.
    pub fn new(status: ActivationStatus, message: Option<&str>) -> Self {
        let template = status.template();
        let text = message
            .filter(|m| !m.is_empty())
            .unwrap_or(template.text)
            .to_owned();
        Self {
            status,
            icon: template.icon,
            title: template.title,
            text,
        }
    }
}

/// The page hosting the activation flow.
pub trait ActivationUi {
    fn show(&mut self, view: &ActivationView);
    fn redirect(&mut self, url: &str);
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ActivationError {
    /// The server answered with a non-2xx status.
    #[display("{_0}")]
    Rejected(String),
    #[display("{_0}")]
    Transport(FailureKind),
}

impl std::error::Error for ActivationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationReport {
    /// The link lacked `uid` or `token`; nothing was sent.
    MissingParams { redirect: String },
    Activated { message: String, redirect: String },
    Failed {
        error: ActivationError,
        redirect: String,
    },
}

impl ActivationReport {
    pub fn redirect(&self) -> &str {
        match self {
            Self::MissingParams { redirect }
            | Self::Activated { redirect, .. }
            | Self::Failed { redirect, .. } => redirect,
        }
    }
}

/// Run the activation flow for `link`, driving `ui` through its states.
pub fn activate_account(
    client: &ApiClient,
    link: &Url,
    ui: &mut impl ActivationUi,
) -> ActivationReport {
    let home = client.config().frontend_page("index.html");
    let Some(params) = ActivationParams::from_url(link) else {
        tracing::warn!("Activation link is missing uid or token");
        ui.redirect(&home);
        return ActivationReport::MissingParams { redirect: home };
    };
    ui.show(&ActivationView::new(ActivationStatus::Processing, None));

    match process_activation(client, &params) {
        Ok(message) => {
            tracing::info!("Account {} activated", params.uid);
            ui.show(&ActivationView::new(ActivationStatus::Success, Some(&message)));
            let redirect = client.config().frontend_page("login.html");
            ui.redirect(&redirect);
            ActivationReport::Activated { message, redirect }
        }
        Err(error) => {
            tracing::warn!("Activation of {} failed: {error}", params.uid);
            let message = error.to_string();
            ui.show(&ActivationView::new(ActivationStatus::Error, Some(&message)));
            ui.redirect(&home);
            ActivationReport::Failed {
                error,
                redirect: home,
            }
        }
    }
}

/// Send the activation request and return the server's success message.
pub fn process_activation(
    client: &ApiClient,
    params: &ActivationParams,
) -> Result<String, ActivationError> {
    match client.get_anonymous(&config::activate_url(&params.uid, &params.token)) {
        Outcome::Failure { kind } => Err(ActivationError::Transport(kind)),
        Outcome::Response { status, data } if status.is_success() => {
            Ok(string_field(&data, "message").unwrap_or(DEFAULT_SUCCESS_MESSAGE).to_owned())
        }
        Outcome::Response { data, .. } => Err(ActivationError::Rejected(
            string_field(&data, "error")
                .unwrap_or(DEFAULT_REJECTION_MESSAGE)
                .to_owned(),
        )),
    }
}

fn string_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// The markup placed inside the page's activation container.
pub fn render_fragment(view: &ActivationView) -> String {
    let mut heading = HtmlElement::new(HtmlTag::Heading1)
        .with_attribute("style", "display:flex; align-items:center; gap:0.25em")
        .with_attribute(
            "class",
            format!("{} d_flex_cs_gl w_full", view.status.title_class()),
        );
    if let Some(icon) = view.icon.and_then(|name| icon_image(view.status, name)) {
        heading.add_child(icon.into());
    }
    heading.add_raw(format!(" {}", escape_html(view.title)));

    let mut container = HtmlElement::new(HtmlTag::Div).with_attribute("id", "activation_content");
    container.add_child(heading.into());
    container.add_child(paragraph(&view.text).into());
    if let Some(notice) = view.status.redirect_notice() {
        container.add_child(paragraph(notice).into());
    }
    container.to_html_string()
}

/// A standalone page showing `view`.
pub fn render_page(view: &ActivationView) -> String {
    let mut page = HtmlPage::new().with_title("Coderr - Account activation");
    page.add_raw(render_fragment(view));
    page.to_html_string()
}

fn paragraph(text: &str) -> HtmlElement {
    HtmlElement::new(HtmlTag::ParagraphText)
        .with_attribute("class", "text_a_c font_prime_color")
        .with_raw(escape_html(text))
}

/// The icon named by the template, embedded as a data URI.
fn icon_image(status: ActivationStatus, name: &str) -> Option<HtmlElement> {
    let svg = match name {
        "check.svg" => CHECK_ICON,
        "error.svg" => ERROR_ICON,
        _ => {
            tracing::warn!("No bundled icon named {name}");
            return None;
        }
    };
    let alt = match status {
        ActivationStatus::Error => "Error",
        _ => "Success",
    };
    let mut img = HtmlElement::new(HtmlTag::Image)
        .with_attribute("src", format!("data:image/svg+xml;base64,{}", BASE64_STANDARD.encode(svg)))
        .with_attribute("alt", alt)
        .with_attribute("title", name)
        .with_attribute("width", 28)
        .with_attribute("height", 28);
    if status == ActivationStatus::Error {
        img.add_attribute("style", "background:red");
    }
    Some(img)
}
