// Entry point for every ledger process: the directory, the ledger store,
// consensus nodes and the user-side commands all live in this one binary.
use bb_ledger::network::{
    Directory, DirectoryClient, InMemoryDirectory, Network, Server, TcpTransport,
};
use bb_ledger::storage::{LedgerStore, RemoteLedgerStore, SledLedgerStore};
use bb_ledger::utils::{decode_private_key, encode_private_key, new_private_key};
use bb_ledger::{Client, Command, Config, LedgerError, Node, Opt, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use std::fs;
use std::path::Path;
use std::process;
use std::sync::Arc;

fn main() {
    // Info by default, RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<()> {
    let mut config = opt.load_config()?;

    match opt.command {
        Command::Directory => {
            let server = Server::bind(
                &config.directory_address,
                Arc::new(InMemoryDirectory::new()),
            )?;
            info!("Directory serving on {}", server.local_addr()?);
            server.run()?;
        }
        Command::Store { addr, data_dir } => {
            if let Some(addr) = addr {
                config.store_address = addr;
            }
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            run_store(&config)?;
        }
        Command::Node {
            name,
            addr,
            difficulty,
            remote_store,
        } => {
            if let Some(name) = name {
                config.node_name = name;
            }
            if let Some(addr) = addr {
                config.node_address = addr;
            }
            if let Some(difficulty) = difficulty {
                config.difficulty = difficulty;
            }
            config.remote_store |= remote_store;
            config.validate()?;
            run_node(&config)?;
        }
        Command::Keygen { output, bits } => {
            let key = new_private_key(bits)?;
            fs::write(&output, encode_private_key(&key)?)?;
            println!("Wrote {bits}-bit key to {}", output.display());
        }
        Command::Register { key, guid } => {
            let client = user_client(&config, &key, guid)?;
            let admission = client.register()?;
            println!("{}: {admission:?}", client.get_guid());
        }
        Command::Send { key, guid, payload } => {
            let client = user_client(&config, &key, Some(guid))?;
            println!("{:?}", client.send(&payload)?);
        }
        Command::Revoke { key, guid } => {
            let client = user_client(&config, &key, Some(guid))?;
            println!("{:?}", client.revoke()?);
        }
        Command::Commit => {
            if anonymous_client(&config).commit()? {
                println!("Proofing round started");
            } else {
                println!("Nothing to commit");
            }
        }
        Command::Lastblock => match anonymous_client(&config).last_block()? {
            Some(block) => println!("{}", block.to_json()?),
            None => println!("No block committed yet"),
        },
        Command::Echo { message } => {
            println!("{}", anonymous_client(&config).echo(&message)?);
        }
    }
    Ok(())
}

fn run_store(config: &Config) -> Result<()> {
    let store = Arc::new(SledLedgerStore::open(config.store_path())?);
    let server = Server::bind(&config.store_address, store)?;
    let addr = server.local_addr()?.to_string();

    let directory = DirectoryClient::new(config.directory_address.as_str());
    directory.register(&config.store_name, &addr)?;
    info!("Ledger store {} serving on {addr}", config.store_name);
    server.run()
}

fn run_node(config: &Config) -> Result<()> {
    let directory: Arc<dyn Directory> =
        Arc::new(DirectoryClient::new(config.directory_address.as_str()));
    let transport = Arc::new(TcpTransport::new());

    let store: Arc<dyn LedgerStore> = if config.remote_store {
        Arc::new(RemoteLedgerStore::new(
            config.store_name.as_str(),
            directory.clone(),
            transport.clone(),
        ))
    } else {
        // one local database per node so several nodes can share a data dir
        let path = config.data_dir.join(&config.node_name).join(&config.store_name);
        Arc::new(SledLedgerStore::open(path)?)
    };

    let network = Network::new(config.node_group.as_str(), directory.clone(), transport);
    let node = Node::new(config.node_name.as_str(), config.difficulty, network, store);

    let server = Server::bind(&config.node_address, node.clone())?;
    let addr = server.local_addr()?.to_string();
    directory.register(&config.node_name, &addr)?;

    // Without a first view of the group the node cannot take part in a round
    let peers = node.get_network().scan().map_err(|e| {
        LedgerError::Connectivity(format!("Initial peer scan failed: {e}"))
    })?;
    info!(
        "Node {} serving on {addr} with {peers} peers, difficulty {}",
        config.node_name, config.difficulty
    );
    server.run()
}

fn load_key(path: &Path) -> Result<rsa::RsaPrivateKey> {
    let pem = fs::read_to_string(path)
        .map_err(|e| LedgerError::Io(format!("Failed to read {}: {e}", path.display())))?;
    decode_private_key(&pem)
}

fn user_client(config: &Config, key: &Path, guid: Option<String>) -> Result<Client> {
    Ok(Client::new(
        guid,
        load_key(key)?,
        config.node_group.as_str(),
        Arc::new(DirectoryClient::new(config.directory_address.as_str())),
        Arc::new(TcpTransport::new()),
    ))
}

fn anonymous_client(config: &Config) -> Client {
    Client::observer(
        config.node_group.as_str(),
        Arc::new(DirectoryClient::new(config.directory_address.as_str())),
        Arc::new(TcpTransport::new()),
    )
}
