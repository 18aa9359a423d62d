use std::time::Duration;

pub const API_BASE_URL: &str = "http://127.0.0.1:8000/api/";
pub const STATIC_BASE_URL: &str = "http://127.0.0.1:8000/";
pub const FRONTEND_BASE_URL: &str = "http://127.0.0.1:5500/coderr/";

pub const LOGIN_URL: &str = "login/";
pub const REGISTER_URL: &str = "registration/";
pub const PROFILE_URL: &str = "profile/";
pub const FORGET_PASSWORD_URL: &str = "password_reset/";
pub const BUSINESS_PROFILES_URL: &str = "profiles/business/";
pub const CUSTOMER_PROFILES_URL: &str = "profiles/customer/";
pub const REVIEW_URL: &str = "reviews/";
pub const ORDER_URL: &str = "orders/";
pub const OFFER_URL: &str = "offers/";
pub const OFFER_DETAIL_URL: &str = "offerdetails/";
pub const BASE_INFO_URL: &str = "base-info/";
pub const OFFER_INPROGRESS_COUNT_URL: &str = "order-count/";
pub const OFFER_COMPLETED_COUNT_URL: &str = "completed-order-count/";

pub const PAGE_SIZE: usize = 6;

/// Endpoint suffix used to activate a freshly registered account.
pub fn activate_url(uid: &str, token: &str) -> String {
    format!("activate/{uid}/{token}/")
}

#[derive(Debug, Clone, Copy)]
pub struct GuestLogin {
    pub username: &'static str,
    pub password: &'static str,
}

pub const GUEST_CUSTOMER: GuestLogin = GuestLogin {
    username: "andrey",
    password: "asdasd",
};

pub const GUEST_BUSINESS: GuestLogin = GuestLogin {
    username: "kevin",
    password: "asdasd24",
};

/// Static content of one activation UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTemplate {
    /// Icon file under the frontend's `assets/icons/`, if any
    pub icon: Option<&'static str>,
    pub title: &'static str,
    pub text: &'static str,
}

pub const ACTIVATION_PROCESSING: MessageTemplate = MessageTemplate {
    icon: None,
    title: "Processing...",
    text: "Please wait while we process your request.",
};

pub const ACTIVATION_SUCCESS: MessageTemplate = MessageTemplate {
    icon: Some("check.svg"),
    title: "Success!",
    text: "Operation completed successfully!",
};

pub const ACTIVATION_ERROR: MessageTemplate = MessageTemplate {
    icon: Some("error.svg"),
    title: "Error!",
    text: "Something went wrong.",
};

/// Runtime view of the base URLs, handed to the client explicitly.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub static_base_url: String,
    pub frontend_base_url: String,
    /// No timeout unless one is asked for; a hung request hangs the caller.
    pub timeout: Option<Duration>,
    /// Ignore `HTTP_PROXY` and friends.
    pub no_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: API_BASE_URL.to_owned(),
            static_base_url: STATIC_BASE_URL.to_owned(),
            frontend_base_url: FRONTEND_BASE_URL.to_owned(),
            timeout: None,
            no_proxy: false,
        }
    }
}

impl ClientConfig {
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_frontend_base_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_base_url = url.into();
        self
    }

    /// Absolute URL of an uploaded file the API reports by relative path.
    pub fn static_url(&self, path: &str) -> String {
        format!("{}{path}", self.static_base_url)
    }

    /// Absolute URL of a frontend page, e.g. `login.html`.
    pub fn frontend_page(&self, page: &str) -> String {
        format!("{}{page}", self.frontend_base_url)
    }
}
