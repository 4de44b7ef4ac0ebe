//! Canned AtomPub documents shared by the unit tests.
//!
//! Collection and link hrefs are relative, so every consumer also exercises
//! resolution against the fetched URL.

use cmis_explorer_core::models::{CredentialsRef, Server};

pub const SERVICE_URL: &str = "http://repo.test/cmis/atom";
pub const ROOT_URL: &str = "http://repo.test/cmis/children?id=root";
pub const ROOT_PAGE_2_URL: &str = "http://repo.test/cmis/children?id=root&skip=2";
pub const DOC_URL: &str = "http://repo.test/cmis/entry?id=d1";

pub fn server() -> Server {
    Server {
        id: "demo".into(),
        name: "Demo".into(),
        url: SERVICE_URL.into(),
        credentials: Some(CredentialsRef {
            username: "admin".into(),
            password: Some("admin".into()),
            password_env: None,
        }),
    }
}

pub fn service_doc(version: Option<&str>) -> String {
    let version = version
        .map(|v| format!("<cmis:cmisVersionSupported>{}</cmis:cmisVersionSupported>", v))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<service xmlns="http://www.w3.org/2007/app"
         xmlns:atom="http://www.w3.org/2005/Atom"
         xmlns:cmis="http://docs.oasis-open.org/ns/cmis/core/200908/"
         xmlns:cmisra="http://docs.oasis-open.org/ns/cmis/restatom/200908/">
  <workspace>
    <atom:title>Demo</atom:title>
    <cmisra:repositoryInfo>
      <cmis:repositoryId>demo-repo</cmis:repositoryId>
      <cmis:repositoryName>Demo Repository</cmis:repositoryName>
      <cmis:vendorName>Test Vendor</cmis:vendorName>
      <cmis:rootFolderId>root</cmis:rootFolderId>
      <cmis:capabilities>
        <cmis:capabilityACL>none</cmis:capabilityACL>
        <cmis:capabilityQuery>metadataonly</cmis:capabilityQuery>
      </cmis:capabilities>
      {version}
    </cmisra:repositoryInfo>
    <collection href="children?id=root">
      <atom:title>Root Collection</atom:title>
      <cmisra:collectionType>root</cmisra:collectionType>
    </collection>
  </workspace>
</service>"#
    )
}

/// Service document whose capabilities differ from [`service_doc`].
pub fn service_doc_with_acl(acl: &str) -> String {
    service_doc(Some("1.0")).replace(
        "<cmis:capabilityACL>none</cmis:capabilityACL>",
        &format!("<cmis:capabilityACL>{}</cmis:capabilityACL>", acl),
    )
}

/// First page of the root folder: one folder and one document, with a
/// relative `next` link.
pub const ROOT_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:cmis="http://docs.oasis-open.org/ns/cmis/core/200908/"
      xmlns:cmisra="http://docs.oasis-open.org/ns/cmis/restatom/200908/">
  <title>Root</title>
  <link rel="self" href="children?id=root"/>
  <link rel="next" href="children?id=root&amp;skip=2"/>
  <cmisra:numItems>3</cmisra:numItems>
  <entry>
    <id>urn:f1</id>
    <title>Projects</title>
    <link rel="self" href="entry?id=f1"/>
    <link rel="down" type="application/atom+xml;type=feed" href="children?id=f1"/>
    <cmisra:object>
      <cmis:properties>
        <cmis:propertyId propertyDefinitionId="cmis:baseTypeId"><cmis:value>cmis:folder</cmis:value></cmis:propertyId>
      </cmis:properties>
    </cmisra:object>
  </entry>
  <entry>
    <id>urn:d1</id>
    <title>report.pdf</title>
    <link rel="self" href="entry?id=d1"/>
    <content type="application/pdf" src="content?id=d1"/>
    <cmisra:object>
      <cmis:properties>
        <cmis:propertyId propertyDefinitionId="cmis:baseTypeId"><cmis:value>cmis:document</cmis:value></cmis:propertyId>
        <cmis:propertyString propertyDefinitionId="cmis:contentStreamMimeType"><cmis:value>application/pdf</cmis:value></cmis:propertyString>
      </cmis:properties>
    </cmisra:object>
  </entry>
</feed>"#;

/// Last page of the root folder.
pub const ROOT_FEED_PAGE_2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Root</title>
  <entry>
    <id>urn:d2</id>
    <title>notes.txt</title>
    <link rel="self" href="entry?id=d2"/>
    <content type="text/plain" src="content?id=d2"/>
  </entry>
</feed>"#;

pub const DOC_ENTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<entry xmlns="http://www.w3.org/2005/Atom"
       xmlns:cmis="http://docs.oasis-open.org/ns/cmis/core/200908/"
       xmlns:cmisra="http://docs.oasis-open.org/ns/cmis/restatom/200908/">
  <id>urn:d1</id>
  <title>report.pdf</title>
  <link rel="self" href="entry?id=d1"/>
  <link rel="up" href="entry?id=root"/>
  <content type="application/pdf" src="content?id=d1"/>
  <cmisra:object>
    <cmis:properties>
      <cmis:propertyId propertyDefinitionId="cmis:objectId"><cmis:value>d1</cmis:value></cmis:propertyId>
      <cmis:propertyId propertyDefinitionId="cmis:baseTypeId"><cmis:value>cmis:document</cmis:value></cmis:propertyId>
      <cmis:propertyString propertyDefinitionId="cmis:name"><cmis:value>report.pdf</cmis:value></cmis:propertyString>
      <cmis:propertyString propertyDefinitionId="cmis:contentStreamMimeType"><cmis:value>application/pdf</cmis:value></cmis:propertyString>
      <cmis:propertyInteger propertyDefinitionId="cmis:contentStreamLength"><cmis:value>1024</cmis:value></cmis:propertyInteger>
    </cmis:properties>
  </cmisra:object>
</entry>"#;
