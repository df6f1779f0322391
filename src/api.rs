//! Public API URL table
//!
//! Every endpoint lives on one of four hosts. The hosts are kept in
//! [`Endpoints`] so they can be pointed elsewhere (a mock server in tests).

use serde::{Deserialize, Serialize};

// =============================================================================
// Hosts
// =============================================================================

const API_BASE: &str = "https://api.weixin.qq.com";
const FILE_BASE: &str = "http://file.api.weixin.qq.com";
const MP_BASE: &str = "https://mp.weixin.qq.com";
const OPEN_BASE: &str = "https://open.weixin.qq.com";

/// Host an endpoint is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    Api,
    File,
    Mp,
    Open,
}

// =============================================================================
// Endpoints
// =============================================================================

/// Named API endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    TokenGet,
    AuthUrl,
    AuthAccessToken,
    FileUpload,
    FileGet,
    MenuCreate,
    MenuGet,
    MenuDelete,
    MessageSend,
    TemplateSend,
    TemplateSetIndustry,
    GroupCreate,
    GroupUpdate,
    GroupGet,
    GroupMemberUpdate,
    UserGroup,
    UserGet,
    UserList,
    UserRemark,
    UserOauthGet,
    QrcodeCreate,
    QrcodeShow,
}

impl Api {
    /// Dotted name, e.g. `token.get`
    pub fn name(self) -> &'static str {
        match self {
            Api::TokenGet => "token.get",
            Api::AuthUrl => "auth.url",
            Api::AuthAccessToken => "auth.access_token",
            Api::FileUpload => "file.upload",
            Api::FileGet => "file.get",
            Api::MenuCreate => "menu.create",
            Api::MenuGet => "menu.get",
            Api::MenuDelete => "menu.delete",
            Api::MessageSend => "message.send",
            Api::TemplateSend => "template.send",
            Api::TemplateSetIndustry => "template.set",
            Api::GroupCreate => "group.create",
            Api::GroupUpdate => "group.update",
            Api::GroupGet => "group.get",
            Api::GroupMemberUpdate => "group.member.update",
            Api::UserGroup => "user.group",
            Api::UserGet => "user.get",
            Api::UserList => "user.list",
            Api::UserRemark => "user.remark",
            Api::UserOauthGet => "user.oauth.get",
            Api::QrcodeCreate => "qrcode.create",
            Api::QrcodeShow => "qrcode.show",
        }
    }

    pub fn host(self) -> Host {
        match self {
            Api::AuthUrl => Host::Open,
            Api::FileUpload | Api::FileGet => Host::File,
            Api::QrcodeCreate | Api::QrcodeShow => Host::Mp,
            _ => Host::Api,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Api::TokenGet => "/cgi-bin/token",
            Api::AuthUrl => "/connect/oauth2/authorize",
            Api::AuthAccessToken => "/sns/oauth2/access_token",
            Api::FileUpload => "/cgi-bin/media/upload",
            Api::FileGet => "/cgi-bin/media/get",
            Api::MenuCreate => "/cgi-bin/menu/create",
            Api::MenuGet => "/cgi-bin/menu/get",
            Api::MenuDelete => "/cgi-bin/menu/delete",
            Api::MessageSend => "/cgi-bin/message/custom/send",
            Api::TemplateSend => "/cgi-bin/message/template/send",
            Api::TemplateSetIndustry => "/cgi-bin/template/api_set_industry",
            Api::GroupCreate => "/cgi-bin/groups/create",
            Api::GroupUpdate => "/cgi-bin/groups/update",
            Api::GroupGet => "/cgi-bin/groups/get",
            Api::GroupMemberUpdate => "/cgi-bin/groups/members/update",
            Api::UserGroup => "/cgi-bin/groups/getid",
            Api::UserGet => "/cgi-bin/user/info",
            Api::UserList => "/cgi-bin/user/get",
            Api::UserRemark => "/cgi-bin/user/info/updateremark",
            Api::UserOauthGet => "/sns/userinfo",
            Api::QrcodeCreate => "/cgi-bin/qrcode/create",
            Api::QrcodeShow => "/cgi-bin/showqrcode",
        }
    }

    /// Whether calls to this endpoint carry the account access token
    pub fn needs_token(self) -> bool {
        !matches!(
            self,
            Api::TokenGet | Api::AuthUrl | Api::AuthAccessToken | Api::UserOauthGet | Api::QrcodeShow
        )
    }
}

/// Base URLs of the four API hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub api: String,
    pub file: String,
    pub mp: String,
    pub open: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api: API_BASE.to_string(),
            file: FILE_BASE.to_string(),
            mp: MP_BASE.to_string(),
            open: OPEN_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Route every host to one base URL
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            api: base.clone(),
            file: base.clone(),
            mp: base.clone(),
            open: base,
        }
    }

    /// Full URL of an endpoint, without query
    pub fn url(&self, api: Api) -> String {
        let base = match api.host() {
            Host::Api => &self.api,
            Host::File => &self.file,
            Host::Mp => &self.mp,
            Host::Open => &self.open,
        };
        format!("{}{}", base.trim_end_matches('/'), api.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.url(Api::TokenGet),
            "https://api.weixin.qq.com/cgi-bin/token"
        );
        assert_eq!(
            endpoints.url(Api::FileUpload),
            "http://file.api.weixin.qq.com/cgi-bin/media/upload"
        );
        assert_eq!(
            endpoints.url(Api::QrcodeShow),
            "https://mp.weixin.qq.com/cgi-bin/showqrcode"
        );
        assert_eq!(
            endpoints.url(Api::AuthUrl),
            "https://open.weixin.qq.com/connect/oauth2/authorize"
        );
    }

    #[test]
    fn test_single_base_trims_slash() {
        let endpoints = Endpoints::single("http://127.0.0.1:9000/");
        assert_eq!(
            endpoints.url(Api::MenuGet),
            "http://127.0.0.1:9000/cgi-bin/menu/get"
        );
    }

    #[test]
    fn test_needs_token() {
        assert!(!Api::TokenGet.needs_token());
        assert!(!Api::QrcodeShow.needs_token());
        assert!(Api::MessageSend.needs_token());
        assert_eq!(Api::GroupMemberUpdate.name(), "group.member.update");
    }
}
