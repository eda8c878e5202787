use super::super::{CliError, Ctx, DirectoryArgs, print_out};
use super::server::server_named;
use crate::Result;
use crate::core::{ClusterDirectoryMetadata, PeerType};

pub(crate) fn handle(ctx: &Ctx, args: DirectoryArgs) -> Result<()> {
    let server = match args.server {
        Some(server) => server,
        None => match &ctx.config.node.server_name {
            Some(name) => name.to_string(),
            None => {
                return Err(CliError::InvalidArgument {
                    field: "server",
                    reason: "pass a server name or set node.server_name".into(),
                }
                .into());
            }
        },
    };
    let md = ctx.open()?.get();
    let machine = server_named(&md, &server)?;
    let peer_type = if args.proxy {
        PeerType::Proxy
    } else {
        PeerType::Server
    };
    let mut directory = ClusterDirectoryMetadata::new(machine, ctx.peer_id(), peer_type);
    directory.ips = args.ips;
    let document = directory.to_document();
    // The document is the output in both modes.
    print_out(true, &document, String::new)
}
