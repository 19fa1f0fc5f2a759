//! Read-only lookups shared by every resource kind.

use forgekit::platform::UserInfo;
use forgekit::reconcile::{ListApi, ResourceApi};
use forgekit::{CancelToken, ResourceClient};
use serde::Serialize;

use super::CmdResult;
use super::output::{ObjectRow, OutputFormat, object_rows, print_rows};

/// Fetch one resource and print it.
pub(crate) async fn print_one<A>(
    client: ResourceClient<A>,
    cancel: &CancelToken,
    r: &A::Ref,
    format: OutputFormat,
) -> CmdResult
where
    A: ResourceApi,
    A::Info: Serialize,
{
    let object = client.get_object(cancel, r).await?;
    print_rows(&[ObjectRow::from_object(&object)], format)?;
    Ok(())
}

/// List every resource under `parent` and print them.
pub(crate) async fn print_list<A>(
    client: ResourceClient<A>,
    cancel: &CancelToken,
    parent: &A::Parent,
    format: OutputFormat,
) -> CmdResult
where
    A: ListApi,
    A::Info: Serialize,
{
    let objects = client.list(cancel, parent).await?;
    if objects.is_empty() && matches!(format, OutputFormat::Table) {
        println!("No {} found under {}", client.api().kind(), parent);
        return Ok(());
    }
    print_rows(&object_rows(&objects), format)?;
    Ok(())
}

/// Print team members, keyed by login.
pub(crate) fn print_members(members: &[UserInfo], format: OutputFormat) -> CmdResult {
    let rows: Vec<ObjectRow> = members
        .iter()
        .map(|member| ObjectRow::from_info(member.login.clone().unwrap_or_default(), member))
        .collect();
    print_rows(&rows, format)?;
    Ok(())
}
