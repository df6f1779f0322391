//! Follower information

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::Api;
use crate::error::Result;
use crate::wechat::Wechat;

/// Follower profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// 0 when the user does not follow the account
    #[serde(default)]
    pub subscribe: i32,
    pub openid: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub sex: Option<i32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub headimgurl: Option<String>,
    #[serde(default)]
    pub subscribe_time: Option<i64>,
    #[serde(default)]
    pub unionid: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub groupid: Option<i64>,
}

/// One page of follower OpenIDs
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserList {
    /// Total number of followers
    #[serde(default)]
    pub total: u64,
    /// Number of OpenIDs in this page
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub data: UserListData,
    /// Pass to the next call; empty on the last page
    #[serde(default)]
    pub next_openid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserListData {
    #[serde(default)]
    pub openid: Vec<String>,
}

/// User API
#[derive(Debug, Clone)]
pub struct User {
    wechat: Wechat,
}

impl User {
    pub fn new(wechat: Wechat) -> Self {
        Self { wechat }
    }

    /// Profile of one follower; `lang` is `zh_CN`, `zh_TW` or `en`
    pub async fn get(&self, openid: &str, lang: &str) -> Result<UserInfo> {
        self.wechat
            .get_as(Api::UserGet, &[("openid", openid), ("lang", lang)])
            .await
    }

    /// Followers, up to 10000 per page
    pub async fn list(&self, next_openid: Option<&str>) -> Result<UserList> {
        match next_openid {
            Some(next) => {
                self.wechat
                    .get_as(Api::UserList, &[("next_openid", next)])
                    .await
            }
            None => self.wechat.get_as(Api::UserList, &[]).await,
        }
    }

    /// Set the remark name of a follower
    pub async fn remark(&self, openid: &str, remark: &str) -> Result<()> {
        self.wechat
            .post(
                Api::UserRemark,
                &[],
                &json!({ "openid": openid, "remark": remark }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_list_deserialize() {
        let json = r#"{"total":2,"count":2,"data":{"openid":["o1","o2"]},"next_openid":"o2"}"#;
        let list: UserList = serde_json::from_str(json).unwrap();
        assert_eq!(list.data.openid, vec!["o1", "o2"]);
        assert_eq!(list.next_openid, "o2");

        // Empty account
        let list: UserList = serde_json::from_str(r#"{"total":0,"count":0,"next_openid":""}"#).unwrap();
        assert!(list.data.openid.is_empty());
    }

    #[test]
    fn test_unsubscribed_user() {
        let user: UserInfo = serde_json::from_str(r#"{"subscribe":0,"openid":"o1"}"#).unwrap();
        assert_eq!(user.subscribe, 0);
        assert!(user.nickname.is_none());
    }
}
