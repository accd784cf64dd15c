//! Projects

use super::{classify, config_from, Operation};
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::marshal::{Args, Param};
use crate::registry::HandleKind;
use crate::scheduler::Pending;
use crate::value::Value;

const ACCESS: Param = Param::handle("access", HandleKind::Access);
const PROJECT: Param = Param::handle("project", HandleKind::Project);

pub(super) const OPERATIONS: &[Operation] = &[
    Operation::new("openProject", &[ACCESS], open_project),
    Operation::new(
        "configOpenProject",
        &[Param::map("config"), ACCESS],
        config_open_project,
    ),
    Operation::new("closeProject", &[PROJECT], close_project),
    Operation::new("revokeAccess", &[PROJECT, ACCESS], revoke_access),
];

fn open_project(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, access| rt.open_project(*access),
        move |_, result, registry| {
            let raw = classify(op, result)?;
            Ok(Value::Handle(registry.register_default(
                raw,
                HandleKind::Project,
                "project",
            )))
        },
    ))
}

fn config_open_project(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let config = config_from(&args.options(0)?)?;
    Ok(bridge.submit(
        op,
        (config, args.handle(1)?),
        |rt, (config, access)| rt.config_open_project(config, *access),
        move |(config, _), result, registry| {
            let raw = classify(op, result)?;
            let label = match config.user_agent {
                Some(agent) => format!("project ({agent})"),
                None => "project".to_string(),
            };
            Ok(Value::Handle(registry.register_default(
                raw,
                HandleKind::Project,
                label,
            )))
        },
    ))
}

/// The project is released whatever the close reports.
fn close_project(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    let reference = args.handle_ref(0)?;
    Ok(bridge.submit(
        op,
        args.handle(0)?,
        |rt, project| {
            let closed = rt.close_project(*project);
            rt.free_project(*project);
            closed
        },
        move |_, result, registry| {
            registry.unregister(reference);
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}

fn revoke_access(bridge: &Bridge, args: Args) -> Result<Pending<Value>, BridgeError> {
    let op = args.operation();
    Ok(bridge.submit(
        op,
        (args.handle(0)?, args.handle(1)?),
        |rt, (project, access)| rt.revoke_access(*project, *access),
        move |_, result, _| {
            classify(op, result)?;
            Ok(Value::Undefined)
        },
    ))
}
