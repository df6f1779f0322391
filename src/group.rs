//! User groups

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::Api;
use crate::error::Result;
use crate::wechat::Wechat;

/// A user group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GroupResponse {
    group: GroupInfo,
}

#[derive(Debug, Deserialize)]
struct GroupListResponse {
    #[serde(default)]
    groups: Vec<GroupInfo>,
}

#[derive(Debug, Deserialize)]
struct UserGroupResponse {
    groupid: i64,
}

/// Group API
#[derive(Debug, Clone)]
pub struct Group {
    wechat: Wechat,
}

impl Group {
    pub fn new(wechat: Wechat) -> Self {
        Self { wechat }
    }

    /// Create a group, returning it with its new id
    pub async fn create(&self, name: &str) -> Result<GroupInfo> {
        let response: GroupResponse = self
            .wechat
            .post_as(Api::GroupCreate, &[], &json!({ "group": { "name": name } }))
            .await?;
        Ok(response.group)
    }

    /// Rename a group
    pub async fn update(&self, group_id: i64, name: &str) -> Result<()> {
        self.wechat
            .post(
                Api::GroupUpdate,
                &[],
                &json!({ "group": { "id": group_id, "name": name } }),
            )
            .await?;
        Ok(())
    }

    /// All groups
    pub async fn list(&self) -> Result<Vec<GroupInfo>> {
        let response: GroupListResponse = self.wechat.get_as(Api::GroupGet, &[]).await?;
        Ok(response.groups)
    }

    /// Move a user into a group
    pub async fn move_user(&self, openid: &str, group_id: i64) -> Result<()> {
        self.wechat
            .post(
                Api::GroupMemberUpdate,
                &[],
                &json!({ "openid": openid, "to_groupid": group_id }),
            )
            .await?;
        Ok(())
    }

    /// Group id of a user
    pub async fn user_group(&self, openid: &str) -> Result<i64> {
        let response: UserGroupResponse = self
            .wechat
            .post_as(Api::UserGroup, &[], &json!({ "openid": openid }))
            .await?;
        Ok(response.groupid)
    }
}
